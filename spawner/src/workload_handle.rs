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

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    LocalProcess,
    Container,
}

pub const LOCAL_PROCESS_BACKEND: &str = "local-process";
pub const CONTAINER_BACKEND: &str = "container";

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::LocalProcess => write!(f, "{LOCAL_PROCESS_BACKEND}"),
            BackendKind::Container => write!(f, "{CONTAINER_BACKEND}"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            LOCAL_PROCESS_BACKEND => Ok(BackendKind::LocalProcess),
            CONTAINER_BACKEND => Ok(BackendKind::Container),
            unknown => Err(format!(
                "Unknown backend '{unknown}'. Supported backends: '{LOCAL_PROCESS_BACKEND}', '{CONTAINER_BACKEND}'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerPhase {
    Unknown,
    Running,
    Exited,
    UnhealthyHost,
}

impl Display for ContainerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerPhase::Unknown => write!(f, "unknown"),
            ContainerPhase::Running => write!(f, "running"),
            ContainerPhase::Exited => write!(f, "exited"),
            ContainerPhase::UnhealthyHost => write!(f, "unhealthy-host"),
        }
    }
}

/// The reattachment record of one tenant's workload. This is the only state
/// that survives a restart of the controlling process. A handle always
/// belongs to exactly one backend, so a process id and a container reference
/// can never be set at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum WorkloadHandle {
    LocalProcess {
        pid: u32,
    },
    Container {
        container_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container_phase: Option<ContainerPhase>,
    },
}

impl WorkloadHandle {
    pub fn local_process(pid: u32) -> Self {
        WorkloadHandle::LocalProcess { pid }
    }

    pub fn container(container_ref: impl Into<String>) -> Self {
        WorkloadHandle::Container {
            container_ref: container_ref.into(),
            container_phase: None,
        }
    }

    /// Tags a container handle with the phase seen by the last inspect.
    /// Process handles carry no phase.
    pub fn with_container_phase(self, phase: Option<ContainerPhase>) -> Self {
        match self {
            WorkloadHandle::Container { container_ref, .. } => WorkloadHandle::Container {
                container_ref,
                container_phase: phase,
            },
            local => local,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self {
            WorkloadHandle::LocalProcess { .. } => BackendKind::LocalProcess,
            WorkloadHandle::Container { .. } => BackendKind::Container,
        }
    }

    /// 0 means "no known process".
    pub fn local_pid(&self) -> u32 {
        match self {
            WorkloadHandle::LocalProcess { pid } => *pid,
            WorkloadHandle::Container { .. } => 0,
        }
    }

    /// Empty means "no known container".
    pub fn container_ref(&self) -> &str {
        match self {
            WorkloadHandle::LocalProcess { .. } => "",
            WorkloadHandle::Container { container_ref, .. } => container_ref,
        }
    }

    pub fn container_phase(&self) -> Option<ContainerPhase> {
        match self {
            WorkloadHandle::LocalProcess { .. } => None,
            WorkloadHandle::Container {
                container_phase, ..
            } => *container_phase,
        }
    }

    /// A handle without a pid or container reference identifies nothing.
    pub fn is_empty(&self) -> bool {
        self.local_pid() == 0 && self.container_ref().is_empty()
    }
}

impl Display for WorkloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadHandle::LocalProcess { pid } => write!(f, "process {pid}"),
            WorkloadHandle::Container {
                container_ref,
                container_phase: None,
            } => write!(f, "container '{}'", short_id(container_ref)),
            WorkloadHandle::Container {
                container_ref,
                container_phase: Some(phase),
            } => write!(f, "container '{}' ({phase})", short_id(container_ref)),
        }
    }
}

pub fn short_id(container_ref: &str) -> &str {
    const SHORT_ID_LENGTH: usize = 12;
    match container_ref.char_indices().nth(SHORT_ID_LENGTH) {
        Some((index, _)) => &container_ref[..index],
        None => container_ref,
    }
}

/// What is known about a workload that is not alive (anymore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExitDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<ContainerPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl ExitDescription {
    pub fn unknown() -> Self {
        ExitDescription::default()
    }

    pub fn with_exit_code(exit_code: i64) -> Self {
        ExitDescription {
            exit_code: Some(exit_code),
            ..Default::default()
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        ExitDescription {
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

impl Display for ExitDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(phase) = &self.phase {
            parts.push(format!("phase '{phase}'"));
        }
        if let Some(exit_code) = &self.exit_code {
            parts.push(format!("exit code {exit_code}"));
        }
        if let Some(message) = &self.message {
            parts.push(format!("'{message}'"));
        }
        if let Some(finished_at) = &self.finished_at {
            parts.push(format!("finished at {finished_at}"));
        }

        if parts.is_empty() {
            write!(f, "no further information")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Alive,
    NotAlive(ExitDescription),
}

impl PollStatus {
    pub fn is_alive(&self) -> bool {
        matches!(self, PollStatus::Alive)
    }
}

impl Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollStatus::Alive => write!(f, "alive"),
            PollStatus::NotAlive(description) => write!(f, "not alive: {description}"),
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
