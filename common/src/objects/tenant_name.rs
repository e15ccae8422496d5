// Copyright (c) 2023 Elektrobit Automotive GmbH
//
// This program and the accompanying materials are made available under the
// terms of the Apache License, Version 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0.
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations
// under the License.
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{std_extensions::IllegalStateResult, TENANT_PLACEHOLDER};

// Tenant names end up in file names, so no path separators and no leading dot.
pub const STR_RE_TENANT: &str = r"^[a-zA-Z0-9][a-zA-Z0-9._@+-]*$";
const MAX_TENANT_NAME_LENGTH: usize = 128;

pub fn validate_tenant_name(tenant_name: &str) -> Result<(), String> {
    const EXPECTED_TENANT_NAME_FORMAT: &str = "It shall start with a letter or a number and contain only regular upper and lowercase characters (a-z and A-Z), numbers and the symbols '.', '_', '@', '+' and '-'.";
    if tenant_name.is_empty() {
        return Err(format!(
            "Empty tenant name is not allowed. {EXPECTED_TENANT_NAME_FORMAT}"
        ));
    }

    if tenant_name.len() > MAX_TENANT_NAME_LENGTH {
        return Err(format!(
            "Tenant name '{tenant_name}' is longer than {MAX_TENANT_NAME_LENGTH} characters."
        ));
    }

    let re = Regex::new(STR_RE_TENANT).unwrap_or_illegal_state();
    if re.is_match(tenant_name) {
        Ok(())
    } else {
        Err(format!(
            "Tenant name '{tenant_name}' is invalid. {EXPECTED_TENANT_NAME_FORMAT}"
        ))
    }
}

/// The owner of exactly one workload. Validated once on creation and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantName(String);

impl TenantName {
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        validate_tenant_name(&name)?;
        Ok(TenantName(name))
    }

    pub fn get(&self) -> &str {
        &self.0
    }

    /// Replaces every `{tenant}` in the template with the tenant name.
    pub fn substitute(&self, template: &str) -> String {
        template.replace(TENANT_PLACEHOLDER, &self.0)
    }
}

impl TryFrom<String> for TenantName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TenantName::new(value)
    }
}

impl From<TenantName> for String {
    fn from(value: TenantName) -> Self {
        value.0
    }
}

impl AsRef<str> for TenantName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for TenantName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
