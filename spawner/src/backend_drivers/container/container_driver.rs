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

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;

use common::objects::TenantName;

use super::container_client::{
    ContainerClient, ContainerInspection, ContainerSpec, ContainerStatus, PortBinding,
    VolumeBinding,
};
use super::ContainerConfig;
use crate::backend_drivers::{BackendDriver, DriverError, EscalationStage, Liveness};
use crate::workload_handle::{
    short_id, BackendKind, ContainerPhase, ExitDescription, WorkloadHandle,
};

const EXITED_STATUS: &str = "exited";
const RUNNING_STATUS: &str = "running";
const CONTAINER_NOT_FOUND: &str = "container not found";

/// Escapes everything but ASCII letters and digits as `-xx` per UTF-8 byte,
/// so the result is a valid container name and different inputs never map to
/// the same name.
pub fn escape_container_name(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        if character.is_ascii_alphanumeric() {
            escaped.push(character);
        } else {
            let mut buffer = [0; 4];
            for byte in character.encode_utf8(&mut buffer).bytes() {
                escaped.push_str(&format!("-{byte:02x}"));
            }
        }
    }
    escaped
}

/// Runs the tenant's workload as a container with a name derived from the
/// tenant, so that creating and inspecting are idempotent per tenant.
pub struct ContainerDriver {
    client: Arc<dyn ContainerClient>,
    container_name: String,
    image: String,
    env: HashMap<String, String>,
    labels: HashMap<String, String>,
    volumes: Vec<VolumeBinding>,
    volume_driver: Option<String>,
    port: PortBinding,
    pull_missing_image: bool,
    credential_env: String,
    remove_on_stop: bool,
    /// Grace granted by the current stop so far. Grows over the stages.
    stop_grace: Duration,
}

impl ContainerDriver {
    pub fn new(
        tenant: &TenantName,
        config: &ContainerConfig,
        remove_on_stop: bool,
        client: Arc<dyn ContainerClient>,
    ) -> Self {
        let volumes = config
            .volumes
            .iter()
            .map(|(name, mount_point)| VolumeBinding {
                name: tenant.substitute(name),
                mount_point: tenant.substitute(mount_point),
            })
            .collect();

        Self {
            client,
            container_name: format!(
                "{}-{}",
                config.name_prefix,
                escape_container_name(tenant.get())
            ),
            image: config.image.clone(),
            env: config.env.clone(),
            labels: config.labels.clone(),
            volumes,
            volume_driver: config.volume_driver.clone(),
            port: PortBinding {
                container_port: config.container_port,
                host_ip: config.host_ip.clone(),
                host_port: config.host_port,
            },
            pull_missing_image: config.pull_missing_image,
            credential_env: config.credential_env.clone(),
            remove_on_stop,
            stop_grace: Duration::ZERO,
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    fn to_liveness(&self, inspection: ContainerInspection) -> Liveness {
        match inspection {
            ContainerInspection::NotFound => {
                log::debug!("Container '{}' not found", self.container_name);
                Liveness::Dead(ExitDescription {
                    phase: Some(ContainerPhase::Unknown),
                    message: Some(CONTAINER_NOT_FOUND.to_string()),
                    ..Default::default()
                })
            }
            ContainerInspection::UnhealthyHost(message) => {
                log::warn!(
                    "Host of container '{}' is unhealthy, treating it as not running: {message}",
                    self.container_name
                );
                Liveness::Dead(ExitDescription {
                    phase: Some(ContainerPhase::UnhealthyHost),
                    message: Some(message),
                    ..Default::default()
                })
            }
            ContainerInspection::Found(status) if status.running => {
                Liveness::Alive(WorkloadHandle::container(status.id))
            }
            ContainerInspection::Found(status) => Liveness::Dead(exit_description(status)),
        }
    }

    async fn prepare_creation(&self) -> Result<(), DriverError> {
        if self.pull_missing_image
            && !self
                .client
                .has_image(&self.image)
                .await
                .map_err(DriverError::Launch)?
        {
            log::info!("Pulling image '{}'", self.image);
            self.client
                .pull_image(&self.image)
                .await
                .map_err(DriverError::Launch)?;
        }

        for volume in &self.volumes {
            log::debug!("Declaring volume '{}'", volume.name);
            self.client
                .create_volume(&volume.name, self.volume_driver.clone())
                .await
                .map_err(|err| {
                    DriverError::Launch(format!(
                        "Could not create volume '{}': {err}",
                        volume.name
                    ))
                })?;
        }
        Ok(())
    }

    fn container_spec(&self, credential: Option<String>) -> ContainerSpec {
        let mut env = self.env.clone();
        if let Some(credential) = credential {
            env.insert(self.credential_env.clone(), credential);
        }

        ContainerSpec {
            name: self.container_name.clone(),
            image: self.image.clone(),
            env,
            labels: self.labels.clone(),
            volumes: self.volumes.clone(),
            port: self.port.clone(),
        }
    }
}

fn exit_description(status: ContainerStatus) -> ExitDescription {
    let phase = match status.status.as_deref() {
        Some(EXITED_STATUS) => ContainerPhase::Exited,
        Some(RUNNING_STATUS) => ContainerPhase::Running,
        _ => ContainerPhase::Unknown,
    };
    ExitDescription {
        exit_code: status.exit_code,
        phase: Some(phase),
        message: status.error,
        finished_at: status.finished_at,
    }
}

fn container_ref(handle: &WorkloadHandle) -> Result<&str, DriverError> {
    match handle {
        WorkloadHandle::Container { container_ref, .. } => Ok(container_ref),
        WorkloadHandle::LocalProcess { .. } => Err(DriverError::Unsupported(format!(
            "A container driver cannot handle {handle}"
        ))),
    }
}

#[async_trait]
impl BackendDriver for ContainerDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Container
    }

    // The container is looked up by its deterministic name, so a persisted
    // container reference is not needed to find it again.
    async fn inspect(&mut self, handle: Option<WorkloadHandle>) -> Result<Liveness, DriverError> {
        if let Some(handle) = &handle {
            container_ref(handle)?;
        }

        let inspection = self
            .client
            .inspect_container(&self.container_name)
            .await
            .map_err(DriverError::Probe)?;
        Ok(self.to_liveness(inspection))
    }

    async fn create_and_launch(
        &mut self,
        credential: Option<String>,
    ) -> Result<WorkloadHandle, DriverError> {
        if self.image.is_empty() {
            return Err(DriverError::Launch("No image configured".to_string()));
        }

        match self
            .client
            .inspect_container(&self.container_name)
            .await
            .map_err(DriverError::Launch)?
        {
            ContainerInspection::Found(status) if status.running => {
                log::info!(
                    "Reusing running container '{}' ({})",
                    self.container_name,
                    short_id(&status.id)
                );
                return Ok(WorkloadHandle::container(status.id));
            }
            ContainerInspection::Found(status) => {
                // The environment is fixed at creation, a new credential is not applied.
                log::info!(
                    "Starting existing container '{}' ({})",
                    self.container_name,
                    short_id(&status.id)
                );
                self.client
                    .start_container(&status.id)
                    .await
                    .map_err(DriverError::Launch)?;
                return Ok(WorkloadHandle::container(status.id));
            }
            ContainerInspection::UnhealthyHost(message) => {
                return Err(DriverError::Launch(format!(
                    "Host of container '{}' is unhealthy: {message}",
                    self.container_name
                )));
            }
            ContainerInspection::NotFound => {}
        }

        self.prepare_creation().await?;

        let container_id = self
            .client
            .create_container(self.container_spec(credential))
            .await
            .map_err(DriverError::Launch)?;
        log::info!(
            "Created container '{}' ({}) from image '{}'",
            self.container_name,
            short_id(&container_id),
            self.image
        );

        self.client
            .start_container(&container_id)
            .await
            .map_err(DriverError::Launch)?;
        log::info!(
            "Started container '{}' ({})",
            self.container_name,
            short_id(&container_id)
        );
        Ok(WorkloadHandle::container(container_id))
    }

    async fn terminate(
        &mut self,
        handle: &WorkloadHandle,
        stage: EscalationStage,
        grace_period: Duration,
    ) -> Result<(), DriverError> {
        let container_ref = container_ref(handle)?;
        if container_ref.is_empty() {
            return Ok(());
        }

        self.stop_grace = match stage {
            EscalationStage::Interrupt => grace_period,
            EscalationStage::Terminate => self.stop_grace.saturating_add(grace_period),
            EscalationStage::Kill => Duration::ZERO,
        };
        let grace_period = self.stop_grace;
        log::debug!(
            "Stopping container '{}' ({}) with a grace period of {:?}",
            self.container_name,
            short_id(container_ref),
            grace_period
        );

        self.client
            .stop_container(container_ref, grace_period)
            .await
            .map_err(DriverError::Terminate)
    }

    async fn release(&mut self, handle: &WorkloadHandle) {
        self.stop_grace = Duration::ZERO;
        if !self.remove_on_stop {
            return;
        }
        let Ok(container_ref) = container_ref(handle) else {
            return;
        };
        if container_ref.is_empty() {
            return;
        }

        log::debug!("Removing container '{}'", self.container_name);
        if let Err(err) = self.client.remove_container(container_ref).await {
            log::warn!(
                "Could not remove container '{}' ({}): {err}",
                self.container_name,
                short_id(container_ref)
            );
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

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc, time::Duration};

    use common::objects::TenantName;
    use mockall::{predicate::eq, Sequence};

    use super::{escape_container_name, ContainerDriver};
    use crate::backend_drivers::container::{
        container_client::{
            ContainerInspection, ContainerStatus, MockContainerClient, VolumeBinding,
        },
        ContainerConfig,
    };
    use crate::backend_drivers::{BackendDriver, DriverError, EscalationStage, Liveness};
    use crate::workload_handle::{ContainerPhase, ExitDescription, WorkloadHandle};

    const CONTAINER_ID: &str = "5ab1b4b1bd7a21fc";
    const CONTAINER_NAME: &str = "workload-alice";
    const IMAGE: &str = "data-api:1.0";

    fn config() -> ContainerConfig {
        ContainerConfig {
            image: IMAGE.into(),
            volumes: BTreeMap::from([("data-{tenant}".to_string(), "/home/{tenant}".to_string())]),
            ..Default::default()
        }
    }

    fn driver(client: MockContainerClient, remove_on_stop: bool) -> ContainerDriver {
        ContainerDriver::new(
            &TenantName::new("alice").unwrap(),
            &config(),
            remove_on_stop,
            Arc::new(client),
        )
    }

    fn status(running: bool) -> ContainerStatus {
        ContainerStatus {
            id: CONTAINER_ID.into(),
            status: Some(if running { "running" } else { "exited" }.into()),
            running,
            exit_code: Some(if running { 0 } else { 137 }),
            error: None,
            finished_at: None,
        }
    }

    #[test]
    fn utest_escape_container_name() {
        assert_eq!(escape_container_name("alice"), "alice");
        assert_eq!(escape_container_name("a.b@c"), "a-2eb-40c");
        assert_eq!(escape_container_name("ü"), "-c3-bc");
        assert_ne!(escape_container_name("a-b"), escape_container_name("a_b"));
    }

    #[test]
    fn utest_container_driver_derives_name_and_volumes() {
        let driver = ContainerDriver::new(
            &TenantName::new("carol.smith").unwrap(),
            &config(),
            false,
            Arc::new(MockContainerClient::new()),
        );

        assert_eq!(driver.container_name(), "workload-carol-2esmith");
        assert_eq!(
            driver.volumes,
            vec![VolumeBinding {
                name: "data-carol.smith".into(),
                mount_point: "/home/carol.smith".into(),
            }]
        );
    }

    #[tokio::test]
    async fn utest_container_driver_inspect_running() {
        let mut client = MockContainerClient::new();
        client
            .expect_inspect_container()
            .with(eq(CONTAINER_NAME))
            .once()
            .returning(|_| Ok(ContainerInspection::Found(status(true))));

        let mut driver = driver(client, false);

        assert_eq!(
            driver.inspect(None).await,
            Ok(Liveness::Alive(WorkloadHandle::container(CONTAINER_ID)))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_inspect_exited() {
        let mut client = MockContainerClient::new();
        client.expect_inspect_container().once().returning(|_| {
            Ok(ContainerInspection::Found(ContainerStatus {
                error: Some("OOM".into()),
                finished_at: Some("2023-06-01 10:00:00 UTC".into()),
                ..status(false)
            }))
        });

        let mut driver = driver(client, false);

        assert_eq!(
            driver
                .inspect(Some(WorkloadHandle::container(CONTAINER_ID)))
                .await,
            Ok(Liveness::Dead(ExitDescription {
                exit_code: Some(137),
                phase: Some(ContainerPhase::Exited),
                message: Some("OOM".into()),
                finished_at: Some("2023-06-01 10:00:00 UTC".into()),
            }))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_inspect_stopping_container_is_not_alive() {
        let mut client = MockContainerClient::new();
        client.expect_inspect_container().once().returning(|_| {
            Ok(ContainerInspection::Found(ContainerStatus {
                status: Some("running".into()),
                exit_code: None,
                ..status(false)
            }))
        });

        let mut driver = driver(client, false);

        assert!(matches!(
            driver.inspect(None).await,
            Ok(Liveness::Dead(ExitDescription {
                phase: Some(ContainerPhase::Running),
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn utest_container_driver_inspect_absent_and_unhealthy_are_distinguished() {
        let mut client = MockContainerClient::new();
        let mut seq = Sequence::new();
        client
            .expect_inspect_container()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(ContainerInspection::NotFound));
        client
            .expect_inspect_container()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(ContainerInspection::UnhealthyHost("500 node down".into())));

        let mut driver = driver(client, false);

        assert_eq!(
            driver.inspect(None).await,
            Ok(Liveness::Dead(ExitDescription {
                phase: Some(ContainerPhase::Unknown),
                message: Some("container not found".into()),
                ..Default::default()
            }))
        );
        assert_eq!(
            driver.inspect(None).await,
            Ok(Liveness::Dead(ExitDescription {
                phase: Some(ContainerPhase::UnhealthyHost),
                message: Some("500 node down".into()),
                ..Default::default()
            }))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_inspect_error_is_probe_error() {
        let mut client = MockContainerClient::new();
        client
            .expect_inspect_container()
            .once()
            .returning(|_| Err("permission denied".into()));

        let mut driver = driver(client, false);

        assert_eq!(
            driver.inspect(None).await,
            Err(DriverError::Probe("permission denied".into()))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_create_new_container() {
        let mut client = MockContainerClient::new();
        let mut seq = Sequence::new();
        client
            .expect_inspect_container()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(ContainerInspection::NotFound));
        client
            .expect_has_image()
            .with(eq(IMAGE))
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));
        client
            .expect_pull_image()
            .with(eq(IMAGE))
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        client
            .expect_create_volume()
            .with(eq("data-alice"), eq(None::<String>))
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        client
            .expect_create_container()
            .withf(|spec| {
                spec.name == CONTAINER_NAME
                    && spec.image == IMAGE
                    && spec.env.get("SPAWNER_API_TOKEN") == Some(&"x".to_string())
                    && spec.port.container_port == 8888
            })
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(CONTAINER_ID.to_string()));
        client
            .expect_start_container()
            .with(eq(CONTAINER_ID))
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut driver = driver(client, false);

        assert_eq!(
            driver.create_and_launch(Some("x".into())).await,
            Ok(WorkloadHandle::container(CONTAINER_ID))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_reuses_running_container() {
        let mut client = MockContainerClient::new();
        client
            .expect_inspect_container()
            .once()
            .returning(|_| Ok(ContainerInspection::Found(status(true))));
        client.expect_create_container().never();
        client.expect_start_container().never();

        let mut driver = driver(client, false);

        assert_eq!(
            driver.create_and_launch(Some("x".into())).await,
            Ok(WorkloadHandle::container(CONTAINER_ID))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_restarts_stopped_container() {
        let mut client = MockContainerClient::new();
        client
            .expect_inspect_container()
            .once()
            .returning(|_| Ok(ContainerInspection::Found(status(false))));
        client.expect_create_container().never();
        client
            .expect_start_container()
            .with(eq(CONTAINER_ID))
            .once()
            .returning(|_| Ok(()));

        let mut driver = driver(client, false);

        assert_eq!(
            driver.create_and_launch(None).await,
            Ok(WorkloadHandle::container(CONTAINER_ID))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_volume_failure_aborts_before_create() {
        let mut client = MockContainerClient::new();
        client
            .expect_inspect_container()
            .once()
            .returning(|_| Ok(ContainerInspection::NotFound));
        client.expect_has_image().once().returning(|_| Ok(true));
        client.expect_pull_image().never();
        client
            .expect_create_volume()
            .once()
            .returning(|_, _| Err("no space left on device".into()));
        client.expect_create_container().never();

        let mut driver = driver(client, false);

        assert!(matches!(
            driver.create_and_launch(None).await,
            Err(DriverError::Launch(msg)) if msg.contains("data-alice")
        ));
    }

    #[tokio::test]
    async fn utest_container_driver_unhealthy_host_fails_launch() {
        let mut client = MockContainerClient::new();
        client
            .expect_inspect_container()
            .once()
            .returning(|_| Ok(ContainerInspection::UnhealthyHost("node down".into())));
        client.expect_create_container().never();

        let mut driver = driver(client, false);

        assert!(matches!(
            driver.create_and_launch(None).await,
            Err(DriverError::Launch(msg)) if msg.contains("unhealthy")
        ));
    }

    #[tokio::test]
    async fn utest_container_driver_create_without_image_fails() {
        let mut driver = ContainerDriver::new(
            &TenantName::new("alice").unwrap(),
            &ContainerConfig::default(),
            false,
            Arc::new(MockContainerClient::new()),
        );

        assert_eq!(
            driver.create_and_launch(None).await,
            Err(DriverError::Launch("No image configured".into()))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_terminate_grace_periods_increase() {
        let mut client = MockContainerClient::new();
        let mut seq = Sequence::new();
        for grace_period in [
            Duration::from_secs(10),
            Duration::from_secs(15),
            Duration::ZERO,
            Duration::from_secs(5),
        ] {
            client
                .expect_stop_container()
                .with(eq(CONTAINER_ID), eq(grace_period))
                .once()
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }

        let mut driver = driver(client, false);
        let handle = WorkloadHandle::container(CONTAINER_ID);

        for (stage, stage_timeout) in [
            (EscalationStage::Interrupt, Duration::from_secs(10)),
            (EscalationStage::Terminate, Duration::from_secs(5)),
            (EscalationStage::Kill, Duration::from_secs(5)),
        ] {
            assert_eq!(driver.terminate(&handle, stage, stage_timeout).await, Ok(()));
        }
        driver.release(&handle).await;

        // an immediate stop starts at the terminate stage
        assert_eq!(
            driver
                .terminate(&handle, EscalationStage::Terminate, Duration::from_secs(5))
                .await,
            Ok(())
        );
    }

    #[tokio::test]
    async fn utest_container_driver_terminate_error() {
        let mut client = MockContainerClient::new();
        client
            .expect_stop_container()
            .once()
            .returning(|_, _| Err("Simulated rejection".into()));

        let mut driver = driver(client, false);

        assert_eq!(
            driver
                .terminate(
                    &WorkloadHandle::container(CONTAINER_ID),
                    EscalationStage::Kill,
                    Duration::ZERO
                )
                .await,
            Err(DriverError::Terminate("Simulated rejection".into()))
        );
    }

    #[tokio::test]
    async fn utest_container_driver_release_removes_only_if_configured() {
        let mut client = MockContainerClient::new();
        client.expect_remove_container().never();
        let mut keeping_driver = driver(client, false);
        keeping_driver
            .release(&WorkloadHandle::container(CONTAINER_ID))
            .await;

        let mut client = MockContainerClient::new();
        client
            .expect_remove_container()
            .with(eq(CONTAINER_ID))
            .once()
            .returning(|_| Err("busy".into()));
        let mut removing_driver = driver(client, true);
        removing_driver
            .release(&WorkloadHandle::container(CONTAINER_ID))
            .await;
    }

    #[tokio::test]
    async fn utest_container_driver_rejects_process_handle() {
        let mut driver = driver(MockContainerClient::new(), false);

        assert!(matches!(
            driver
                .inspect(Some(WorkloadHandle::local_process(42)))
                .await,
            Err(DriverError::Unsupported(_))
        ));
    }
}
