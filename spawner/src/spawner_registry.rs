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

use std::{collections::HashMap, sync::Arc};

use common::objects::TenantName;
use tokio::sync::Mutex;

use crate::backend_drivers::{
    container::{ContainerClient, ContainerConfig, ContainerDriver, PodmanClient},
    local_process::{LocalProcessConfig, LocalProcessDriver},
    BackendDriver,
};
use crate::spawner::{Spawner, SpawnerError, SpawnerSettings};
use crate::spawner_config::SpawnerConfig;
use crate::state_store::StateStore;
use crate::workload_handle::BackendKind;

pub type SharedSpawner = Arc<Mutex<Spawner>>;

enum DriverFactory {
    LocalProcess(LocalProcessConfig),
    Container {
        config: ContainerConfig,
        remove_on_stop: bool,
        client: Arc<dyn ContainerClient>,
    },
}

impl DriverFactory {
    fn create(&self, tenant: &TenantName) -> Box<dyn BackendDriver> {
        match self {
            DriverFactory::LocalProcess(config) => {
                Box::new(LocalProcessDriver::new(tenant.clone(), config.clone()))
            }
            DriverFactory::Container {
                config,
                remove_on_stop,
                client,
            } => Box::new(ContainerDriver::new(
                tenant,
                config,
                *remove_on_stop,
                client.clone(),
            )),
        }
    }
}

/// Hands out the one spawner of each tenant. All container drivers share
/// one control-plane client.
pub struct SpawnerRegistry {
    driver_factory: DriverFactory,
    settings: SpawnerSettings,
    store: Arc<dyn StateStore>,
    spawners: Mutex<HashMap<TenantName, SharedSpawner>>,
}

impl SpawnerRegistry {
    pub fn new(config: &SpawnerConfig, store: Arc<dyn StateStore>) -> Self {
        Self::with_container_client(config, store, None)
    }

    /// `container_client` replaces the Podman client of the container backend.
    pub fn with_container_client(
        config: &SpawnerConfig,
        store: Arc<dyn StateStore>,
        container_client: Option<Arc<dyn ContainerClient>>,
    ) -> Self {
        let driver_factory = match config.backend {
            BackendKind::LocalProcess => DriverFactory::LocalProcess(config.local_process.clone()),
            BackendKind::Container => DriverFactory::Container {
                config: config.container.clone(),
                remove_on_stop: config.remove_on_stop,
                client: container_client.unwrap_or_else(|| {
                    Arc::new(PodmanClient::new(&config.container.socket_path))
                }),
            },
        };

        Self {
            driver_factory,
            settings: config.settings(),
            store,
            spawners: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, tenant: &TenantName) -> Result<SharedSpawner, SpawnerError> {
        let mut spawners = self.spawners.lock().await;
        if let Some(spawner) = spawners.get(tenant) {
            return Ok(spawner.clone());
        }

        log::debug!("Creating the spawner of '{}'", tenant.get());
        let spawner = Arc::new(Mutex::new(
            Spawner::new(
                tenant.clone(),
                self.driver_factory.create(tenant),
                self.store.clone(),
                self.settings.clone(),
            )
            .await?,
        ));
        spawners.insert(tenant.clone(), spawner.clone());
        Ok(spawner)
    }

    /// Drops every spawner that tracks no workload, is not polling and is
    /// not held by anyone else. Returns how many were dropped.
    pub async fn remove_idle(&self) -> usize {
        let mut spawners = self.spawners.lock().await;
        let mut idle = Vec::new();
        for (tenant, spawner) in spawners.iter() {
            if Arc::strong_count(spawner) > 1 {
                continue;
            }
            let Ok(spawner) = spawner.try_lock() else {
                continue;
            };
            if !spawner.is_polling() && spawner.get_state().await.is_none() {
                idle.push(tenant.clone());
            }
        }

        for tenant in &idle {
            log::debug!("Dropping the idle spawner of '{}'", tenant.get());
            spawners.remove(tenant);
        }
        idle.len()
    }

    pub async fn len(&self) -> usize {
        self.spawners.lock().await.len()
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
    use std::sync::Arc;

    use common::objects::TenantName;

    use super::SpawnerRegistry;
    use crate::backend_drivers::container::{ContainerClient, MockContainerClient};
    use crate::spawner_config::SpawnerConfig;
    use crate::state_store::{MemoryStateStore, StateStore};
    use crate::workload_handle::{BackendKind, WorkloadHandle};

    #[tokio::test]
    async fn utest_registry_returns_one_spawner_per_tenant() {
        let registry = SpawnerRegistry::new(
            &SpawnerConfig::default(),
            Arc::new(MemoryStateStore::new()),
        );
        let alice = TenantName::new("alice").unwrap();
        let bob = TenantName::new("bob").unwrap();

        let first = registry.get_or_create(&alice).await.unwrap();
        let second = registry.get_or_create(&alice).await.unwrap();
        let other = registry.get_or_create(&bob).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len().await, 2);
        assert_eq!(first.lock().await.tenant(), &alice);
        assert_eq!(
            first.lock().await.backend_kind().await,
            BackendKind::LocalProcess
        );
    }

    #[tokio::test]
    async fn utest_registry_container_drivers_share_client() {
        let mut config = SpawnerConfig {
            backend: BackendKind::Container,
            ..Default::default()
        };
        config.container.image = "alpine:latest".to_string();
        let client: Arc<dyn ContainerClient> = Arc::new(MockContainerClient::new());

        let registry = SpawnerRegistry::with_container_client(
            &config,
            Arc::new(MemoryStateStore::new()),
            Some(client.clone()),
        );

        let alice = registry
            .get_or_create(&TenantName::new("alice").unwrap())
            .await
            .unwrap();
        registry
            .get_or_create(&TenantName::new("bob").unwrap())
            .await
            .unwrap();

        assert_eq!(alice.lock().await.backend_kind().await, BackendKind::Container);
        assert_eq!(Arc::strong_count(&client), 4);
    }

    #[tokio::test]
    async fn utest_registry_remove_idle_keeps_tracked_and_shared_spawners() {
        let store = Arc::new(MemoryStateStore::new());
        let bob = TenantName::new("bob").unwrap();
        store
            .save(&bob, &WorkloadHandle::local_process(4711))
            .await
            .unwrap();
        let registry = SpawnerRegistry::new(&SpawnerConfig::default(), store);

        registry
            .get_or_create(&TenantName::new("alice").unwrap())
            .await
            .unwrap();
        registry.get_or_create(&bob).await.unwrap();
        let held = registry
            .get_or_create(&TenantName::new("carol").unwrap())
            .await
            .unwrap();

        assert_eq!(registry.remove_idle().await, 1);
        assert_eq!(registry.len().await, 2);

        drop(held);
        assert_eq!(registry.remove_idle().await, 1);
        assert_eq!(registry.len().await, 1);
        let kept = registry.get_or_create(&bob).await.unwrap();
        assert!(kept.lock().await.get_state().await.is_some());
    }
}
