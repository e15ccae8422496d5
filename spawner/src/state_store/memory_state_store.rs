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

use std::collections::HashMap;

use async_trait::async_trait;
use common::objects::TenantName;
use tokio::sync::Mutex;

use super::{StateStore, StateStoreError};
use crate::workload_handle::WorkloadHandle;

/// Non durable store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    handles: Mutex<HashMap<TenantName, WorkloadHandle>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, tenant: &TenantName) -> Result<Option<WorkloadHandle>, StateStoreError> {
        Ok(self.handles.lock().await.get(tenant).cloned())
    }

    async fn save(
        &self,
        tenant: &TenantName,
        handle: &WorkloadHandle,
    ) -> Result<(), StateStoreError> {
        self.handles
            .lock()
            .await
            .insert(tenant.clone(), handle.clone());
        Ok(())
    }

    async fn clear(&self, tenant: &TenantName) -> Result<(), StateStoreError> {
        self.handles.lock().await.remove(tenant);
        Ok(())
    }
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
