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

use async_trait::async_trait;
use hyper::http;
use podman_api::{
    models::{NamedVolume, PortMapping},
    opts::{
        ContainerCreateOpts, ContainerDeleteOpts, ContainerStopOpts, ImageListFilter,
        ImageListOpts, PullOpts, VolumeCreateOpts,
    },
    Podman,
};

use super::container_client::{
    ContainerClient, ContainerInspection, ContainerSpec, ContainerStatus, PortBinding,
    VolumeBinding,
};

const TCP_PROTOCOL: &str = "tcp";

fn to_port_mapping(port: &PortBinding) -> PortMapping {
    PortMapping {
        container_port: Some(port.container_port),
        host_port: port.host_port,
        host_ip: Some(port.host_ip.clone()),
        protocol: Some(TCP_PROTOCOL.to_string()),
        range: None,
    }
}

fn to_named_volume(volume: &VolumeBinding) -> NamedVolume {
    NamedVolume {
        dest: Some(volume.mount_point.clone()),
        is_anonymous: None,
        name: Some(volume.name.clone()),
        options: None,
    }
}

// The stop API takes whole seconds. A started second counts in full.
fn grace_seconds(grace_period: Duration) -> usize {
    let seconds = grace_period.as_secs() + u64::from(grace_period.subsec_nanos() > 0);
    usize::try_from(seconds).unwrap_or(usize::MAX)
}

/// Control plane client talking to the Podman REST API over its unix socket.
#[derive(Debug)]
pub struct PodmanClient {
    podman: Podman,
}

impl PodmanClient {
    pub fn new(socket_path: &str) -> Self {
        Self {
            podman: Podman::unix(socket_path),
        }
    }
}

#[async_trait]
impl ContainerClient for PodmanClient {
    async fn has_image(&self, image: &str) -> Result<bool, String> {
        match self
            .podman
            .images()
            .list(
                &ImageListOpts::builder()
                    .filter(vec![ImageListFilter::Reference(image.into(), None)])
                    .build(),
            )
            .await
        {
            Ok(list) => Ok(!list.is_empty()),
            Err(err) => Err(err.to_string()),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), String> {
        use futures_util::{StreamExt, TryStreamExt};

        self.podman
            .images()
            .pull(&PullOpts::builder().reference(image).build())
            .map(|report| {
                report.and_then(|report| match report.error {
                    Some(error) => Err(podman_api::Error::InvalidResponse(error)),
                    None => Ok(()),
                })
            })
            .try_collect()
            .await
            .map_err(|err| err.to_string())
    }

    async fn create_volume(&self, name: &str, driver: Option<String>) -> Result<(), String> {
        let mut opts = VolumeCreateOpts::builder().name(name);
        if let Some(driver) = driver {
            opts = opts.driver(driver);
        }

        match self.podman.volumes().create(&opts.build()).await {
            Ok(_) => Ok(()),
            Err(podman_api::Error::Fault {
                code: http::StatusCode::CONFLICT,
                message,
            }) => {
                log::debug!("Volume '{name}' already exists. Message: '{message}'");
                Ok(())
            }
            Err(err) => Err(err.to_string()),
        }
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<String, String> {
        match self
            .podman
            .containers()
            .create(
                &ContainerCreateOpts::builder()
                    .image(&spec.image)
                    .name(&spec.name)
                    .env(&spec.env)
                    .labels(&spec.labels)
                    .volumes(spec.volumes.iter().map(to_named_volume))
                    .portmappings(vec![to_port_mapping(&spec.port)])
                    .build(),
            )
            .await
        {
            Ok(response) => Ok(response.id),
            Err(err) => Err(err.to_string()),
        }
    }

    async fn start_container(&self, container_id: &str) -> Result<(), String> {
        match self.podman.containers().get(container_id).start(None).await {
            Ok(()) => Ok(()),
            Err(podman_api::Error::Fault {
                code: http::StatusCode::NOT_MODIFIED,
                ..
            }) => {
                log::debug!("Container '{container_id}' is already running");
                Ok(())
            }
            Err(err) => Err(err.to_string()),
        }
    }

    async fn stop_container(
        &self,
        container_id: &str,
        grace_period: Duration,
    ) -> Result<(), String> {
        match self
            .podman
            .containers()
            .get(container_id)
            .stop(
                &ContainerStopOpts::builder()
                    .timeout(grace_seconds(grace_period))
                    .build(),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(podman_api::Error::Fault {
                code: http::StatusCode::NOT_MODIFIED,
                message,
            }) => {
                log::debug!(
                    "Cannot stop container '{}'. Already stopped. Message: '{}'",
                    container_id,
                    message
                );
                Ok(())
            }
            Err(podman_api::Error::Fault {
                code: http::StatusCode::NOT_FOUND,
                message,
            }) => {
                log::debug!(
                    "Cannot stop container '{}'. Not found. Message: '{}'",
                    container_id,
                    message
                );
                Ok(())
            }
            Err(err) => Err(err.to_string()),
        }
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), String> {
        match self
            .podman
            .containers()
            .get(container_id)
            .delete(&ContainerDeleteOpts::builder().volumes(true).build())
            .await
        {
            Ok(()) => Ok(()),
            Err(podman_api::Error::Fault {
                code: http::StatusCode::NOT_FOUND,
                message,
            }) => {
                log::debug!(
                    "Cannot delete container '{}'. Not found. Message: '{}'",
                    container_id,
                    message
                );
                Ok(())
            }
            Err(err) => Err(err.to_string()),
        }
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerInspection, String> {
        match self.podman.containers().get(name).inspect().await {
            Ok(info) => {
                let id = info.id.unwrap_or_else(|| name.to_string());
                let status = match info.state {
                    Some(state) => ContainerStatus {
                        id,
                        status: state.status,
                        running: state.running.unwrap_or(false),
                        exit_code: state.exit_code.map(i64::from),
                        error: state.error.filter(|x| !x.is_empty()),
                        finished_at: state.finished_at.map(|x| x.to_string()),
                    },
                    None => ContainerStatus {
                        id,
                        status: None,
                        running: false,
                        exit_code: None,
                        error: None,
                        finished_at: None,
                    },
                };
                Ok(ContainerInspection::Found(status))
            }
            Err(podman_api::Error::Fault {
                code: http::StatusCode::NOT_FOUND,
                ..
            }) => Ok(ContainerInspection::NotFound),
            Err(podman_api::Error::Fault { code, message }) if code.is_server_error() => {
                Ok(ContainerInspection::UnhealthyHost(format!("{code}: {message}")))
            }
            Err(err) => Err(err.to_string()),
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
