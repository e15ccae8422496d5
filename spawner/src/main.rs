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

use std::sync::Arc;

use common::{config::handle_config, graceful_exit::ExitGracefully};
use env_logger::Env;

use spawner::{
    access::{authorize, Caller},
    cli::{self, Commands},
    endpoint::wait_for_endpoint,
    spawner_config::{SpawnerConfig, DEFAULT_SPAWNER_CONFIG_FILE_PATH},
    spawner_registry::SpawnerRegistry,
    state_store::FileStateStore,
};

#[tokio::main]
async fn main() {
    env_logger::init_from_env(Env::new().default_filter_or("info"));

    let args = cli::parse();

    let mut config: SpawnerConfig =
        handle_config(args.config_path.as_deref(), DEFAULT_SPAWNER_CONFIG_FILE_PATH)
            .unwrap_or_exit("Config file could not be loaded");
    config.update_with_args(&args);
    config
        .validate()
        .unwrap_or_exit("Invalid spawner configuration");

    let caller = args.caller.as_ref().map(|name| Caller {
        name: name.to_string(),
        admin: args.admin,
    });
    authorize(caller.as_ref(), &args.tenant).unwrap_or_exit("Access denied");

    log::debug!(
        "Starting the spawner with \n\tbackend: '{}', \n\tstate directory: '{}'",
        config.backend,
        config.state_dir,
    );

    let store = Arc::new(FileStateStore::new(&config.state_dir));
    let registry = SpawnerRegistry::new(&config, store);
    let shared_spawner = registry
        .get_or_create(&args.tenant)
        .await
        .unwrap_or_exit("Could not restore the spawner state");
    let mut spawner = shared_spawner.lock().await;

    match args.command {
        Commands::Start(start_args) => {
            let outcome = spawner
                .start(start_args.credential)
                .await
                .unwrap_or_exit("Could not start the workload");
            if outcome.created {
                println!("Started {}", outcome.handle);
            } else {
                println!("Reusing {}", outcome.handle);
            }

            if start_args.wait {
                match config.endpoint_port() {
                    Some(port) => {
                        wait_for_endpoint(&config.endpoint.ip, port, config.http_timeout())
                            .await
                            .unwrap_or_exit("Workload is not reachable");
                        println!("Listening on {}:{port}", config.endpoint.ip);
                    }
                    None => log::warn!("No endpoint port configured, not waiting"),
                }
            }
        }
        Commands::Stop(stop_args) => {
            let outcome = spawner
                .stop(stop_args.now)
                .await
                .unwrap_or_exit("Could not stop the workload");
            println!("{outcome}");
        }
        Commands::State => match spawner.get_state().await {
            Some(handle) => println!(
                "{}",
                serde_json::to_string_pretty(&handle)
                    .unwrap_or_exit("Could not serialize the workload handle")
            ),
            None => println!("absent"),
        },
        Commands::Poll => {
            let status = spawner
                .poll()
                .await
                .unwrap_or_exit("Could not poll the workload");
            println!("{status}");
        }
        Commands::Watch => {
            let (sender, mut receiver) = tokio::sync::mpsc::channel::<String>(1);
            spawner.add_listener_with(
                move |tenant: String| {
                    let _ = sender.try_send(tenant);
                },
                args.tenant.get().to_string(),
            );
            spawner.start_polling().await;
            if !spawner.is_polling() {
                log::error!(
                    "Cannot watch the workload of '{}': polling is disabled",
                    args.tenant.get()
                );
                std::process::exit(1);
            }

            if let Some(tenant) = receiver.recv().await {
                println!("Workload of '{tenant}' is gone");
            }
        }
    }

    drop(spawner);
    drop(shared_spawner);
    if registry.remove_idle().await > 0 {
        log::debug!("No workload left for '{}'", args.tenant.get());
    }
}
