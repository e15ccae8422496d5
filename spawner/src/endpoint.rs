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

use tokio::{net::TcpStream, time};

const FIRST_RETRY_DELAY: Duration = Duration::from_millis(50);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Waits until something accepts TCP connections on `ip:port`.
pub async fn wait_for_endpoint(ip: &str, port: u16, timeout: Duration) -> Result<(), String> {
    let connect = async {
        let mut delay = FIRST_RETRY_DELAY;
        loop {
            match TcpStream::connect((ip, port)).await {
                Ok(_) => return,
                Err(err) => {
                    log::debug!("Endpoint {ip}:{port} not reachable yet: {err}");
                    time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    };

    time::timeout(timeout, connect).await.map_err(|_| {
        format!(
            "Endpoint {ip}:{port} not reachable after {} seconds",
            timeout.as_secs_f64()
        )
    })
}

//////////////////////////////////////////////////////////////////////////////
//                 ########  #######    #########  #########                //
//                    ##     ##        ##             ##                    //
//                    ##     #####     #########      ##                    //
//                    ##     ##                ##     ##                    //
//                    ##     #######   #########      ##                    //
//////////////////////////////////////////////////////////////////////////////
