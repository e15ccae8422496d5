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
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

#[cfg(test)]
use mockall::automock;

use crate::spawner::SpawnerError;
use crate::workload_handle::PollStatus;

pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Callbacks fired once when the workload is observed dead by the poller.
#[derive(Clone, Default)]
pub struct Listeners {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl Listeners {
    pub fn add(&self, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Binds `args` to `callback` at registration time.
    pub fn add_with<A>(&self, callback: impl Fn(A) + Send + Sync + 'static, args: A)
    where
        A: Clone + Send + Sync + 'static,
    {
        self.add(Arc::new(move || callback(args.clone())));
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedules every listener as its own task. No order between them.
    pub fn notify_all(&self) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            tokio::spawn(async move { listener() });
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self) -> Result<PollStatus, SpawnerError>;
}

/// Periodic liveness check. Stops itself after the first observed death and
/// notifies the listeners exactly once.
#[derive(Debug)]
pub struct LivenessPoller {
    task_handle: JoinHandle<()>,
}

impl LivenessPoller {
    pub fn start(
        name: String,
        poll_interval: Duration,
        probe: impl LivenessProbe + 'static,
        listeners: Listeners,
    ) -> Self {
        let task_handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + poll_interval, poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match probe.probe().await {
                    Ok(PollStatus::Alive) => {}
                    Ok(PollStatus::NotAlive(_)) => {
                        log::debug!(
                            "Notifying {} listener(s) about the end of '{name}'",
                            listeners.len()
                        );
                        listeners.notify_all();
                        break;
                    }
                    Err(err) => log::warn!("Could not poll '{name}': {err}"),
                }
            }
        });

        LivenessPoller { task_handle }
    }

    pub fn stop(&self) {
        self.task_handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }
}

impl Drop for LivenessPoller {
    fn drop(&mut self) {
        self.task_handle.abort();
    }
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
