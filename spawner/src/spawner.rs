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

use std::{fmt::Display, sync::Arc, time::Duration};

use async_trait::async_trait;
use common::objects::TenantName;
use tokio::{sync::Mutex, time};

use crate::backend_drivers::{BackendDriver, DriverError, EscalationStage, Liveness};
use crate::liveness_poller::{Listeners, LivenessPoller, LivenessProbe};
use crate::state_store::{StateStore, StateStoreError};
use crate::workload_handle::{BackendKind, ExitDescription, PollStatus, WorkloadHandle};

pub const DEFAULT_DEATH_CHECK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnerError {
    Launch(String),
    Probe(String),
    Terminate(String),
    StateStore(String),
    StartTimeout(Duration),
}

impl Display for SpawnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnerError::Launch(msg) => write!(f, "Could not start workload: {msg}"),
            SpawnerError::Probe(msg) => write!(f, "Could not determine workload state: {msg}"),
            SpawnerError::Terminate(msg) => write!(f, "Could not stop workload: {msg}"),
            SpawnerError::StateStore(msg) => write!(f, "{msg}"),
            SpawnerError::StartTimeout(timeout) => write!(
                f,
                "Workload did not start within {} seconds",
                timeout.as_secs_f64()
            ),
        }
    }
}

impl From<DriverError> for SpawnerError {
    fn from(value: DriverError) -> Self {
        match value {
            DriverError::Launch(msg) => SpawnerError::Launch(msg),
            DriverError::Probe(msg) | DriverError::Unsupported(msg) => SpawnerError::Probe(msg),
            DriverError::Terminate(msg) => SpawnerError::Terminate(msg),
        }
    }
}

impl From<StateStoreError> for SpawnerError {
    fn from(value: StateStoreError) -> Self {
        SpawnerError::StateStore(value.to_string())
    }
}

/// Wait budgets after each escalation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationTimeouts {
    pub interrupt: Duration,
    pub terminate: Duration,
    pub kill: Duration,
}

impl EscalationTimeouts {
    pub fn for_stage(&self, stage: EscalationStage) -> Duration {
        match stage {
            EscalationStage::Interrupt => self.interrupt,
            EscalationStage::Terminate => self.terminate,
            EscalationStage::Kill => self.kill,
        }
    }
}

impl Default for EscalationTimeouts {
    fn default() -> Self {
        Self {
            interrupt: Duration::from_secs(10),
            terminate: Duration::from_secs(5),
            kill: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnerSettings {
    pub start_timeout: Duration,
    /// `None` disables polling.
    pub poll_interval: Option<Duration>,
    pub escalation: EscalationTimeouts,
    pub death_check_interval: Duration,
}

impl Default for SpawnerSettings {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(60),
            poll_interval: Some(Duration::from_secs(30)),
            escalation: EscalationTimeouts::default(),
            death_check_interval: DEFAULT_DEATH_CHECK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    /// `false` when an already running workload was reused.
    pub created: bool,
    pub handle: WorkloadHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    AlreadyExited,
    Terminated(EscalationStage),
    /// Survived the kill stage. Bookkeeping is cleared anyway.
    NeverDied,
}

impl Display for StopOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopOutcome::AlreadyExited => write!(f, "already exited"),
            StopOutcome::Terminated(stage) => write!(f, "stopped after {stage}"),
            StopOutcome::NeverDied => write!(f, "never died"),
        }
    }
}

struct SpawnerState {
    tenant: TenantName,
    handle: Option<WorkloadHandle>,
    /// Launched by a start that has not persisted it yet.
    unsaved: Option<WorkloadHandle>,
    credential: Option<String>,
    driver: Box<dyn BackendDriver>,
    store: Arc<dyn StateStore>,
    polling_active: bool,
}

impl SpawnerState {
    async fn start(&mut self, credential: Option<String>) -> Result<StartOutcome, SpawnerError> {
        match self.driver.inspect(self.handle.clone()).await? {
            Liveness::Alive(current) => {
                log::info!(
                    "Workload of '{}' is already running as {current}",
                    self.tenant.get()
                );
                self.remember(&current).await?;
                Ok(StartOutcome {
                    created: false,
                    handle: current,
                })
            }
            Liveness::Dead(_) => {
                let handle = self.driver.create_and_launch(credential.clone()).await?;
                self.unsaved = Some(handle.clone());
                if let Err(err) = self.store.save(&self.tenant, &handle).await {
                    self.discard_unsaved().await;
                    return Err(err.into());
                }
                self.unsaved = None;
                self.handle = Some(handle.clone());
                self.credential = credential;
                log::info!("Started workload of '{}' as {handle}", self.tenant.get());
                Ok(StartOutcome {
                    created: true,
                    handle,
                })
            }
        }
    }

    async fn poll(&mut self) -> Result<PollStatus, SpawnerError> {
        match self.driver.inspect(self.handle.clone()).await? {
            Liveness::Alive(current) => {
                self.remember(&current).await?;
                Ok(PollStatus::Alive)
            }
            Liveness::Dead(description) => {
                if let Some(ended) = self.ended_handle(&description) {
                    log::debug!(
                        "Workload of '{}' ended as {ended}: {description}",
                        self.tenant.get()
                    );
                    self.forget().await?;
                }
                Ok(PollStatus::NotAlive(description))
            }
        }
    }

    async fn stop(
        &mut self,
        immediate: bool,
        settings: &SpawnerSettings,
    ) -> Result<StopOutcome, SpawnerError> {
        let handle = match self.driver.inspect(self.handle.clone()).await? {
            Liveness::Alive(handle) => handle,
            Liveness::Dead(description) => {
                log::debug!(
                    "Workload of '{}' already exited: {description}",
                    self.tenant.get()
                );
                if let Some(ended) = self.ended_handle(&description) {
                    self.driver.release(&ended).await;
                    self.forget().await?;
                }
                return Ok(StopOutcome::AlreadyExited);
            }
        };

        let mut stage = Some(if immediate {
            EscalationStage::Terminate
        } else {
            EscalationStage::Interrupt
        });

        while let Some(current) = stage {
            let timeout = settings.escalation.for_stage(current);
            self.driver.terminate(&handle, current, timeout).await?;
            if self
                .wait_for_death(&handle, timeout, settings.death_check_interval)
                .await?
            {
                log::info!(
                    "Workload of '{}' stopped after {current}",
                    self.tenant.get()
                );
                self.driver.release(&handle).await;
                self.forget().await?;
                return Ok(StopOutcome::Terminated(current));
            }
            stage = current.next();
        }

        log::warn!(
            "Workload of '{}' ({handle}) never died, forgetting it anyway",
            self.tenant.get()
        );
        self.forget().await?;
        Ok(StopOutcome::NeverDied)
    }

    async fn wait_for_death(
        &mut self,
        handle: &WorkloadHandle,
        timeout: Duration,
        check_interval: Duration,
    ) -> Result<bool, SpawnerError> {
        let deadline = time::Instant::now() + timeout;
        loop {
            if !self.driver.inspect(Some(handle.clone())).await?.is_alive() {
                return Ok(true);
            }
            let now = time::Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            time::sleep(check_interval.min(deadline - now)).await;
        }
    }

    async fn remember(&mut self, current: &WorkloadHandle) -> Result<(), SpawnerError> {
        if self.handle.as_ref() != Some(current) {
            self.store.save(&self.tenant, current).await?;
            self.handle = Some(current.clone());
        }
        Ok(())
    }

    /// The known handle, tagged with the phase an inspect reported for it.
    fn ended_handle(&self, description: &ExitDescription) -> Option<WorkloadHandle> {
        self.handle
            .clone()
            .map(|handle| handle.with_container_phase(description.phase))
    }

    /// Kills a workload whose handle never reached the store, so no
    /// untracked workload outlives a failed start.
    async fn discard_unsaved(&mut self) {
        let Some(handle) = self.unsaved.take() else {
            return;
        };
        log::warn!(
            "Killing workload {handle} of '{}', its handle could not be persisted",
            self.tenant.get()
        );
        if let Err(err) = self
            .driver
            .terminate(&handle, EscalationStage::Kill, Duration::ZERO)
            .await
        {
            log::warn!("Could not kill {handle}: {err}");
        }
        self.driver.release(&handle).await;
    }

    async fn forget(&mut self) -> Result<(), SpawnerError> {
        self.handle = None;
        self.credential = None;
        self.store.clear(&self.tenant).await?;
        Ok(())
    }
}

struct SpawnerProbe {
    state: Arc<Mutex<SpawnerState>>,
}

#[async_trait]
impl LivenessProbe for SpawnerProbe {
    async fn probe(&self) -> Result<PollStatus, SpawnerError> {
        let mut state = self.state.lock().await;
        if !state.polling_active {
            return Ok(PollStatus::Alive);
        }
        let status = state.poll().await?;
        if let PollStatus::NotAlive(description) = &status {
            state.polling_active = false;
            log::info!(
                "Workload of '{}' ended unexpectedly: {description}",
                state.tenant.get()
            );
        }
        Ok(status)
    }
}

/// Owns the lifecycle of one tenant's workload. All lifecycle operations of
/// one spawner are serialized.
pub struct Spawner {
    tenant: TenantName,
    state: Arc<Mutex<SpawnerState>>,
    listeners: Listeners,
    poller: Option<LivenessPoller>,
    settings: SpawnerSettings,
}

impl Spawner {
    /// Restores the persisted handle of the tenant. A handle of a different
    /// backend is ignored.
    pub async fn new(
        tenant: TenantName,
        driver: Box<dyn BackendDriver>,
        store: Arc<dyn StateStore>,
        settings: SpawnerSettings,
    ) -> Result<Self, SpawnerError> {
        let handle = match store.load(&tenant).await? {
            Some(handle) if handle.backend_kind() != driver.kind() => {
                log::warn!(
                    "Ignoring persisted {} handle of '{}', the configured backend is '{}'",
                    handle.backend_kind(),
                    tenant.get(),
                    driver.kind()
                );
                None
            }
            Some(handle) if handle.is_empty() => None,
            handle => handle,
        };
        if let Some(handle) = &handle {
            log::debug!("Restored handle of '{}': {handle}", tenant.get());
        }

        Ok(Spawner {
            tenant: tenant.clone(),
            state: Arc::new(Mutex::new(SpawnerState {
                tenant,
                handle,
                unsaved: None,
                credential: None,
                driver,
                store,
                polling_active: false,
            })),
            listeners: Listeners::default(),
            poller: None,
            settings,
        })
    }

    pub fn tenant(&self) -> &TenantName {
        &self.tenant
    }

    pub async fn backend_kind(&self) -> BackendKind {
        self.state.lock().await.driver.kind()
    }

    pub async fn start(&self, credential: Option<String>) -> Result<StartOutcome, SpawnerError> {
        let timeout = self.settings.start_timeout;
        let mut state = self.state.lock().await;
        let result = time::timeout(timeout, state.start(credential)).await;
        match result {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Start of the workload of '{}' timed out",
                    self.tenant.get()
                );
                state.discard_unsaved().await;
                Err(SpawnerError::StartTimeout(timeout))
            }
        }
    }

    /// Interrupt, terminate and finally kill, each followed by a bounded wait.
    /// `immediate` skips the interrupt stage.
    pub async fn stop(&mut self, immediate: bool) -> Result<StopOutcome, SpawnerError> {
        self.stop_polling().await;
        let mut state = self.state.lock().await;
        state.stop(immediate, &self.settings).await
    }

    pub async fn poll(&self) -> Result<PollStatus, SpawnerError> {
        self.state.lock().await.poll().await
    }

    pub async fn get_state(&self) -> Option<WorkloadHandle> {
        self.state.lock().await.handle.clone()
    }

    /// Only kept in memory and dropped when the workload is stopped.
    pub async fn credential(&self) -> Option<String> {
        self.state.lock().await.credential.clone()
    }

    pub fn add_listener(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.add(Arc::new(listener));
    }

    pub fn add_listener_with<A>(&self, callback: impl Fn(A) + Send + Sync + 'static, args: A)
    where
        A: Clone + Send + Sync + 'static,
    {
        self.listeners.add_with(callback, args);
    }

    pub async fn start_polling(&mut self) {
        self.stop_polling().await;
        let Some(poll_interval) = self.settings.poll_interval else {
            log::debug!("Polling is disabled for '{}'", self.tenant.get());
            return;
        };

        self.state.lock().await.polling_active = true;
        self.poller = Some(LivenessPoller::start(
            self.tenant.get().to_string(),
            poll_interval,
            SpawnerProbe {
                state: self.state.clone(),
            },
            self.listeners.clone(),
        ));
    }

    pub async fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        self.state.lock().await.polling_active = false;
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .as_ref()
            .is_some_and(|poller| poller.is_running())
    }
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
