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

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub name: String,
    pub mount_point: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub container_port: u16,
    pub host_ip: String,
    /// A free port is chosen by the runtime if not set.
    pub host_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub volumes: Vec<VolumeBinding>,
    pub port: PortBinding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub id: String,
    pub status: Option<String>,
    pub running: bool,
    pub exit_code: Option<i64>,
    pub error: Option<String>,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerInspection {
    NotFound,
    /// The control plane answered with a server error.
    UnhealthyHost(String),
    Found(ContainerStatus),
}

/// The part of the container control plane the spawner needs. One client is
/// shared by the container drivers of all tenants and holds no tenant state.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContainerClient: Send + Sync {
    async fn has_image(&self, image: &str) -> Result<bool, String>;
    async fn pull_image(&self, image: &str) -> Result<(), String>;
    /// Declaring an already existing volume is not an error.
    async fn create_volume(&self, name: &str, driver: Option<String>) -> Result<(), String>;
    async fn create_container(&self, spec: ContainerSpec) -> Result<String, String>;
    async fn start_container(&self, container_id: &str) -> Result<(), String>;
    /// Waits up to `grace_period` before the container is killed.
    async fn stop_container(&self, container_id: &str, grace_period: Duration)
        -> Result<(), String>;
    async fn remove_container(&self, container_id: &str) -> Result<(), String>;
    async fn inspect_container(&self, name: &str) -> Result<ContainerInspection, String>;
}
