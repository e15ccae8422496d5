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

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::backend_drivers::local_process::DEFAULT_CREDENTIAL_ENV;

pub const DEFAULT_PODMAN_SOCKET: &str = "/run/podman/podman.sock";
const DEFAULT_NAME_PREFIX: &str = "workload";
const DEFAULT_CONTAINER_PORT: u16 = 8888;
const DEFAULT_HOST_IP: &str = "127.0.0.1";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    pub socket_path: String,
    pub image: String,
    pub name_prefix: String,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    /// Volume name template to mount point. Both may contain `{tenant}`.
    pub volumes: BTreeMap<String, String>,
    pub volume_driver: Option<String>,
    pub container_port: u16,
    pub host_ip: String,
    pub host_port: Option<u16>,
    pub pull_missing_image: bool,
    pub credential_env: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            socket_path: DEFAULT_PODMAN_SOCKET.to_string(),
            image: String::new(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            env: HashMap::new(),
            labels: HashMap::new(),
            volumes: BTreeMap::new(),
            volume_driver: None,
            container_port: DEFAULT_CONTAINER_PORT,
            host_ip: DEFAULT_HOST_IP.to_string(),
            host_port: None,
            pull_missing_image: true,
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
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
