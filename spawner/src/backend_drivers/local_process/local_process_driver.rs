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
    collections::HashMap, os::unix::process::ExitStatusExt, path::PathBuf, process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use nix::{
    errno::Errno,
    sys::signal::{kill, Signal},
    unistd::{Pid, User},
};
use tokio::process::{Child, Command};

use common::objects::TenantName;

use super::LocalProcessConfig;
use crate::backend_drivers::{BackendDriver, DriverError, EscalationStage, Liveness};
use crate::workload_handle::{BackendKind, ExitDescription, WorkloadHandle};

const DEBUG_FLAG: &str = "--debug";

/// Runs the tenant's workload as a local child process in its own process
/// group. Processes spawned by this driver are polled via their child handle,
/// processes only known from persisted state are probed with signal 0.
pub struct LocalProcessDriver {
    tenant: TenantName,
    config: LocalProcessConfig,
    child: Option<Child>,
}

impl LocalProcessDriver {
    pub fn new(tenant: TenantName, config: LocalProcessConfig) -> Self {
        Self {
            tenant,
            config,
            child: None,
        }
    }

    fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self
            .config
            .cmd
            .iter()
            .skip(1)
            .cloned()
            .chain(self.config.args.iter().map(|x| self.tenant.substitute(x)))
            .collect();
        if self.config.debug {
            args.push(DEBUG_FLAG.to_string());
        }
        args
    }

    fn launch_env(
        &self,
        account: Option<&User>,
        credential: Option<&str>,
    ) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = self
            .config
            .env_keep
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.clone(), value)))
            .collect();

        env.extend(self.config.env.clone());
        env.insert("USER".to_string(), self.tenant.get().to_string());
        if let Some(account) = account {
            env.insert("HOME".to_string(), account.dir.to_string_lossy().into_owned());
            env.insert(
                "SHELL".to_string(),
                account.shell.to_string_lossy().into_owned(),
            );
        }
        if let Some(credential) = credential {
            env.insert(self.config.credential_env.clone(), credential.to_string());
        }
        env
    }

    fn lookup_account(&self) -> Option<User> {
        match User::from_name(self.tenant.get()) {
            Ok(account) => account,
            Err(err) => {
                log::debug!(
                    "Could not look up a system account for '{}': {err}",
                    self.tenant
                );
                None
            }
        }
    }

    fn working_dir(&self, account: Option<&User>) -> Option<PathBuf> {
        self.config
            .cwd
            .clone()
            .or_else(|| account.map(|x| x.dir.clone()).filter(|x| x.is_dir()))
    }

    fn probe_own_child(
        &mut self,
        handle: &WorkloadHandle,
    ) -> Option<Result<Liveness, DriverError>> {
        let child = self.child.as_mut()?;
        if child.id() != Some(handle.local_pid()) {
            return None;
        }

        let result = match child.try_wait() {
            Ok(None) => Ok(Liveness::Alive(handle.clone())),
            Ok(Some(status)) => {
                self.child = None;
                Ok(Liveness::Dead(exit_description(status)))
            }
            Err(err) => Err(DriverError::Probe(format!(
                "Could not get the exit status of process {}: {err}",
                handle.local_pid()
            ))),
        };
        Some(result)
    }
}

fn exit_description(status: std::process::ExitStatus) -> ExitDescription {
    match (status.code(), status.signal()) {
        (Some(code), _) => ExitDescription::with_exit_code(code.into()),
        (None, Some(signal)) => {
            ExitDescription::with_message(format!("killed by signal {signal}"))
        }
        (None, None) => ExitDescription::unknown(),
    }
}

fn quoted_command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|arg| format!("\"{arg}\"")))
        .collect::<Vec<String>>()
        .join(" ")
}

fn to_pid(handle: &WorkloadHandle) -> Result<Option<Pid>, DriverError> {
    match handle {
        WorkloadHandle::LocalProcess { pid: 0 } => Ok(None),
        WorkloadHandle::LocalProcess { pid } => i32::try_from(*pid)
            .map(|pid| Some(Pid::from_raw(pid)))
            .map_err(|_| DriverError::Unsupported(format!("Invalid process id {pid}"))),
        WorkloadHandle::Container { .. } => Err(DriverError::Unsupported(format!(
            "A local process driver cannot handle {handle}"
        ))),
    }
}

#[async_trait]
impl BackendDriver for LocalProcessDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalProcess
    }

    async fn inspect(&mut self, handle: Option<WorkloadHandle>) -> Result<Liveness, DriverError> {
        let Some(handle) = handle else {
            return Ok(Liveness::Dead(ExitDescription::unknown()));
        };
        let Some(pid) = to_pid(&handle)? else {
            return Ok(Liveness::Dead(ExitDescription::unknown()));
        };

        if let Some(result) = self.probe_own_child(&handle) {
            return result;
        }

        match kill(pid, None) {
            Ok(()) => Ok(Liveness::Alive(handle)),
            Err(Errno::ESRCH) => Ok(Liveness::Dead(ExitDescription::unknown())),
            Err(err) => Err(DriverError::Probe(format!(
                "Signal 0 to process {pid} failed: {err}"
            ))),
        }
    }

    async fn create_and_launch(
        &mut self,
        credential: Option<String>,
    ) -> Result<WorkloadHandle, DriverError> {
        let program = self
            .config
            .cmd
            .first()
            .ok_or_else(|| DriverError::Launch("No command configured".to_string()))?
            .clone();
        let args = self.launch_args();
        let account = self.lookup_account();

        let mut command = Command::new(&program);
        command
            .args(&args)
            .env_clear()
            .envs(self.launch_env(account.as_ref(), credential.as_deref()))
            .stdin(Stdio::null())
            .process_group(0);
        if let Some(cwd) = self.working_dir(account.as_ref()) {
            command.current_dir(cwd);
        }

        log::info!(
            "Spawning workload of '{}': {}",
            self.tenant,
            quoted_command_line(&program, &args)
        );
        let child = command.spawn().map_err(|err| {
            DriverError::Launch(format!(
                "Could not spawn '{}': {err}",
                quoted_command_line(&program, &args)
            ))
        })?;
        let pid = child.id().ok_or_else(|| {
            DriverError::Launch(format!("Process '{program}' exited immediately"))
        })?;

        self.child = Some(child);
        Ok(WorkloadHandle::local_process(pid))
    }

    async fn terminate(
        &mut self,
        handle: &WorkloadHandle,
        stage: EscalationStage,
        _grace_period: Duration,
    ) -> Result<(), DriverError> {
        let Some(pid) = to_pid(handle)? else {
            return Ok(());
        };

        let signal = match stage {
            EscalationStage::Interrupt => {
                log::debug!("Interrupting {pid}");
                Signal::SIGINT
            }
            EscalationStage::Terminate => {
                log::debug!("Terminating {pid}");
                Signal::SIGTERM
            }
            EscalationStage::Kill => {
                log::debug!("Killing {pid}");
                Signal::SIGKILL
            }
        };

        match kill(pid, signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(err) => Err(DriverError::Terminate(format!(
                "Sending {signal} to process {pid} failed: {err}"
            ))),
        }
    }

    async fn release(&mut self, handle: &WorkloadHandle) {
        if self
            .child
            .as_ref()
            .is_some_and(|child| child.id() == Some(handle.local_pid()))
        {
            self.child = None;
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
