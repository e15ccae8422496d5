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

use std::time::Duration;

use common::config::{ConfigFile, ConversionErrors, CONFIG_VERSION};
use serde::Deserialize;

use crate::backend_drivers::{container::ContainerConfig, local_process::LocalProcessConfig};
use crate::cli::Arguments;
use crate::spawner::{EscalationTimeouts, SpawnerSettings, DEFAULT_DEATH_CHECK_INTERVAL};
use crate::workload_handle::BackendKind;

pub const DEFAULT_SPAWNER_CONFIG_FILE_PATH: &str = "/etc/spawner/spawner.conf";
pub const DEFAULT_STATE_DIR: &str = "/tmp/spawner/state";
const DEFAULT_ENDPOINT_IP: &str = "127.0.0.1";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub ip: String,
    pub port: Option<u16>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_ENDPOINT_IP.to_string(),
            port: None,
        }
    }
}

/// All durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpawnerConfig {
    pub version: String,
    pub backend: BackendKind,
    pub state_dir: String,
    pub start_timeout: u64,
    pub http_timeout: u64,
    pub poll_interval: i64,
    pub interrupt_timeout: u64,
    pub term_timeout: u64,
    pub kill_timeout: u64,
    pub remove_on_stop: bool,
    pub endpoint: EndpointConfig,
    pub local_process: LocalProcessConfig,
    pub container: ContainerConfig,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            backend: BackendKind::LocalProcess,
            state_dir: DEFAULT_STATE_DIR.to_string(),
            start_timeout: 60,
            http_timeout: 30,
            poll_interval: 30,
            interrupt_timeout: 10,
            term_timeout: 5,
            kill_timeout: 5,
            remove_on_stop: false,
            endpoint: EndpointConfig::default(),
            local_process: LocalProcessConfig::default(),
            container: ContainerConfig::default(),
        }
    }
}

impl ConfigFile for SpawnerConfig {
    fn version(&self) -> &str {
        &self.version
    }
}

impl SpawnerConfig {
    pub fn update_with_args(&mut self, args: &Arguments) {
        if let Some(state_dir) = &args.state_dir {
            self.state_dir = state_dir.to_string();
        }

        if let Some(backend) = args.backend {
            self.backend = backend;
        }

        if let Some(poll_interval) = args.poll_interval {
            self.poll_interval = poll_interval;
        }
    }

    pub fn validate(&self) -> Result<(), ConversionErrors> {
        if self.backend == BackendKind::Container && self.container.image.is_empty() {
            return Err(ConversionErrors::InvalidConfig(
                "the container backend needs an image".to_string(),
            ));
        }
        if self.backend == BackendKind::LocalProcess && self.local_process.cmd.is_empty() {
            return Err(ConversionErrors::InvalidConfig(
                "the local-process backend needs a command".to_string(),
            ));
        }
        Ok(())
    }

    pub fn settings(&self) -> SpawnerSettings {
        SpawnerSettings {
            start_timeout: Duration::from_secs(self.start_timeout),
            poll_interval: u64::try_from(self.poll_interval)
                .ok()
                .filter(|seconds| *seconds > 0)
                .map(Duration::from_secs),
            escalation: EscalationTimeouts {
                interrupt: Duration::from_secs(self.interrupt_timeout),
                terminate: Duration::from_secs(self.term_timeout),
                kill: Duration::from_secs(self.kill_timeout),
            },
            death_check_interval: DEFAULT_DEATH_CHECK_INTERVAL,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// The address the workload listens on, if one is known.
    pub fn endpoint_port(&self) -> Option<u16> {
        match self.backend {
            BackendKind::LocalProcess => self.endpoint.port,
            BackendKind::Container => self.endpoint.port.or(self.container.host_port),
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
