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

use std::{fmt::Display, time::Duration};

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::workload_handle::{BackendKind, ExitDescription, WorkloadHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    Launch(String),
    Probe(String),
    Terminate(String),
    Unsupported(String),
}

impl Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverError::Launch(msg) => write!(f, "Could not launch workload: {msg}"),
            DriverError::Probe(msg) => write!(f, "Could not probe workload: {msg}"),
            DriverError::Terminate(msg) => write!(f, "Could not terminate workload: {msg}"),
            DriverError::Unsupported(msg) => write!(f, "Unsupported: {msg}"),
        }
    }
}

/// Stages of the termination escalation, from cooperative to unignorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationStage {
    Interrupt,
    Terminate,
    Kill,
}

impl EscalationStage {
    pub fn next(self) -> Option<EscalationStage> {
        match self {
            EscalationStage::Interrupt => Some(EscalationStage::Terminate),
            EscalationStage::Terminate => Some(EscalationStage::Kill),
            EscalationStage::Kill => None,
        }
    }
}

impl Display for EscalationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscalationStage::Interrupt => write!(f, "interrupt"),
            EscalationStage::Terminate => write!(f, "terminate"),
            EscalationStage::Kill => write!(f, "kill"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// Carries the handle as currently known to the backend, which may be
    /// more up to date than the persisted one.
    Alive(WorkloadHandle),
    Dead(ExitDescription),
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, Liveness::Alive(_))
    }
}

/// Capability set every backend offers to the spawner. A driver belongs to
/// exactly one tenant and is selected once when the spawner is built.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendDriver: Send {
    fn kind(&self) -> BackendKind;

    /// Never blocks on the workload. A probe that fails for any other reason
    /// than "the workload does not exist" is an error and not a death.
    async fn inspect(&mut self, handle: Option<WorkloadHandle>) -> Result<Liveness, DriverError>;

    async fn create_and_launch(
        &mut self,
        credential: Option<String>,
    ) -> Result<WorkloadHandle, DriverError>;

    /// `grace_period` is the time the spawner is going to wait for the
    /// workload to die after this stage.
    async fn terminate(
        &mut self,
        handle: &WorkloadHandle,
        stage: EscalationStage,
        grace_period: Duration,
    ) -> Result<(), DriverError>;

    /// Cleanup after the workload is gone. Failures are only logged.
    async fn release(&mut self, handle: &WorkloadHandle);
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
