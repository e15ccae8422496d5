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

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use common::objects::TenantName;
use tokio::fs;

use super::{StateStore, StateStoreError};
use crate::workload_handle::WorkloadHandle;

const STATE_FILE_EXTENSION: &str = "json";
const TMP_FILE_EXTENSION: &str = "json.tmp";

/// Keeps one JSON document per tenant in a state directory. Tenant names are
/// validated on creation, so they are safe to use as file names.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    state_dir: PathBuf,
}

impl FileStateStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn state_file(&self, tenant: &TenantName) -> PathBuf {
        self.state_dir
            .join(format!("{}.{STATE_FILE_EXTENSION}", tenant.get()))
    }

    fn tmp_file(&self, tenant: &TenantName) -> PathBuf {
        self.state_dir
            .join(format!("{}.{TMP_FILE_EXTENSION}", tenant.get()))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, tenant: &TenantName) -> Result<Option<WorkloadHandle>, StateStoreError> {
        let state_file = self.state_file(tenant);
        let content = match fs::read(&state_file).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::debug!("No persisted state for tenant '{tenant}'");
                return Ok(None);
            }
            Err(err) => {
                return Err(StateStoreError::Io(format!(
                    "Could not read '{}': {err}",
                    state_file.display()
                )))
            }
        };

        let handle = serde_json::from_slice::<WorkloadHandle>(&content).map_err(|err| {
            StateStoreError::Serialization(format!(
                "Could not parse '{}': {err}",
                state_file.display()
            ))
        })?;
        log::debug!("Loaded state of tenant '{tenant}': {handle}");
        Ok(Some(handle))
    }

    async fn save(
        &self,
        tenant: &TenantName,
        handle: &WorkloadHandle,
    ) -> Result<(), StateStoreError> {
        let content = serde_json::to_vec_pretty(handle)
            .map_err(|err| StateStoreError::Serialization(err.to_string()))?;

        fs::create_dir_all(&self.state_dir).await.map_err(|err| {
            StateStoreError::Io(format!(
                "Could not create state directory '{}': {err}",
                self.state_dir.display()
            ))
        })?;

        // Write and rename, so a crash never leaves a half written state file.
        let tmp_file = self.tmp_file(tenant);
        fs::write(&tmp_file, content).await.map_err(|err| {
            StateStoreError::Io(format!("Could not write '{}': {err}", tmp_file.display()))
        })?;
        let state_file = self.state_file(tenant);
        fs::rename(&tmp_file, &state_file).await.map_err(|err| {
            StateStoreError::Io(format!(
                "Could not move '{}' to '{}': {err}",
                tmp_file.display(),
                state_file.display()
            ))
        })?;

        log::debug!("Saved state of tenant '{tenant}': {handle}");
        Ok(())
    }

    async fn clear(&self, tenant: &TenantName) -> Result<(), StateStoreError> {
        let state_file = self.state_file(tenant);
        match fs::remove_file(&state_file).await {
            Ok(()) => {
                log::debug!("Cleared state of tenant '{tenant}'");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StateStoreError::Io(format!(
                "Could not remove '{}': {err}",
                state_file.display()
            ))),
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
