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

mod container_client;
mod container_config;
mod container_driver;
mod podman_client;

#[cfg(test)]
pub(crate) mod test_utils;

pub use container_client::{
    ContainerClient, ContainerInspection, ContainerSpec, ContainerStatus, PortBinding,
    VolumeBinding,
};
pub use container_config::{ContainerConfig, DEFAULT_PODMAN_SOCKET};
pub use container_driver::{escape_container_name, ContainerDriver};
pub use podman_client::PodmanClient;

#[cfg(test)]
pub use container_client::MockContainerClient;
