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

use common::objects::TenantName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub name: String,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    NotAuthenticated,
    Forbidden { caller: String, tenant: String },
}

impl Display for AccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessError::NotAuthenticated => write!(f, "Caller is not authenticated"),
            AccessError::Forbidden { caller, tenant } => write!(
                f,
                "'{caller}' may not operate on the workload of '{tenant}'"
            ),
        }
    }
}

/// A caller may act on a tenant's workload if it is that tenant or an admin.
pub fn authorize(caller: Option<&Caller>, tenant: &TenantName) -> Result<(), AccessError> {
    let caller = caller.ok_or(AccessError::NotAuthenticated)?;
    if caller.admin || caller.name == tenant.get() {
        Ok(())
    } else {
        log::debug!(
            "Denied access of '{}' to the workload of '{}'",
            caller.name,
            tenant.get()
        );
        Err(AccessError::Forbidden {
            caller: caller.name.clone(),
            tenant: tenant.get().to_string(),
        })
    }
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
