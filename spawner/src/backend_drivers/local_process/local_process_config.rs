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

use std::{collections::HashMap, path::PathBuf};

use serde::Deserialize;

pub const DEFAULT_CREDENTIAL_ENV: &str = "SPAWNER_API_TOKEN";

const DEFAULT_ENV_KEEP: [&str; 7] = [
    "PATH",
    "PYTHONPATH",
    "CONDA_ROOT",
    "CONDA_DEFAULT_ENV",
    "VIRTUAL_ENV",
    "LANG",
    "LC_ALL",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalProcessConfig {
    pub cmd: Vec<String>,
    /// May contain `{tenant}`.
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Variables of the controlling process passed on to the workload.
    pub env_keep: Vec<String>,
    pub credential_env: String,
    pub debug: bool,
}

impl Default for LocalProcessConfig {
    fn default() -> Self {
        Self {
            cmd: vec!["node".to_string()],
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            env_keep: DEFAULT_ENV_KEEP.iter().map(|x| x.to_string()).collect(),
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
            debug: false,
        }
    }
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
