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

use clap::{Parser, Subcommand};
use common::objects::TenantName;

use crate::workload_handle::BackendKind;

pub fn parse() -> Arguments {
    Arguments::parse()
}

fn parse_tenant_name(name: &str) -> Result<TenantName, String> {
    TenantName::new(name)
}

#[derive(Parser, Debug)]
#[command(name = "spawner")]
#[command(bin_name = "spawner")]
#[command(version)]
/// Start, stop and watch the workload of a tenant
pub struct Arguments {
    #[clap(short = 'c', long = "config", env = "SPAWNER_CONFIG")]
    /// The path to the spawner config file.
    pub config_path: Option<String>,
    #[clap(long = "state-dir", env = "SPAWNER_STATE_DIR")]
    /// The directory where the workload handles are persisted.
    pub state_dir: Option<String>,
    #[clap(short = 'b', long = "backend", env = "SPAWNER_BACKEND")]
    /// The backend running the workloads: 'local-process' or 'container'.
    pub backend: Option<BackendKind>,
    #[clap(
        long = "poll-interval",
        env = "SPAWNER_POLL_INTERVAL",
        allow_negative_numbers = true
    )]
    /// Seconds between liveness checks. Zero or less disables polling.
    pub poll_interval: Option<i64>,
    #[clap(long = "caller", env = "SPAWNER_CALLER")]
    /// The authenticated name of the caller.
    pub caller: Option<String>,
    #[clap(long = "admin", requires = "caller")]
    /// The caller may operate on the workloads of all tenants.
    pub admin: bool,
    #[clap(value_parser = parse_tenant_name)]
    /// The tenant owning the workload.
    pub tenant: TenantName,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the workload or reuse the running one
    Start(StartArgs),
    /// Stop the workload, escalating from interrupt to kill
    Stop(StopArgs),
    /// Print the persisted workload handle
    State,
    /// Check once whether the workload is alive
    Poll,
    /// Block until the workload ends unexpectedly
    Watch,
}

#[derive(clap::Args, Debug)]
pub struct StartArgs {
    #[clap(long = "credential", env = "SPAWNER_CREDENTIAL")]
    /// Credential handed to the workload through its environment.
    pub credential: Option<String>,
    #[clap(long = "wait")]
    /// Wait until the workload accepts connections on its endpoint.
    pub wait: bool,
}

#[derive(clap::Args, Debug)]
pub struct StopArgs {
    #[clap(long = "now")]
    /// Skip the interrupt stage.
    pub now: bool,
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
