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

mod file_state_store;
mod memory_state_store;

pub use file_state_store::FileStateStore;
pub use memory_state_store::MemoryStateStore;

use std::fmt::Display;

use async_trait::async_trait;
use common::objects::TenantName;

#[cfg(test)]
use mockall::automock;

use crate::workload_handle::WorkloadHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateStoreError {
    Io(String),
    Serialization(String),
}

impl Display for StateStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateStoreError::Io(msg) => write!(f, "State store I/O error: {msg}"),
            StateStoreError::Serialization(msg) => {
                write!(f, "State store serialization error: {msg}")
            }
        }
    }
}

/// Durable record of the workload handle per tenant. Read once when a
/// spawner is created and written after every state changing operation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, tenant: &TenantName) -> Result<Option<WorkloadHandle>, StateStoreError>;
    async fn save(&self, tenant: &TenantName, handle: &WorkloadHandle)
        -> Result<(), StateStoreError>;
    async fn clear(&self, tenant: &TenantName) -> Result<(), StateStoreError>;
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
