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
    error::Error,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use hyperlocal::UnixServerExt;
use rand::Rng;
use serde_json::Value;
use tokio::{net::UnixStream, sync::oneshot, task::JoinHandle};

use super::FakeRoute;

type Routes = Arc<Mutex<Vec<FakeRoute>>>;
type ServerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// A libpod API served from canned [`FakeRoute`]s on a throwaway unix
/// socket. Requests without a route get a 501.
pub struct FakePodman {
    socket_path: String,
    routes: Routes,
    server: JoinHandle<ServerResult>,
    pending: Vec<oneshot::Receiver<()>>,
}

impl FakePodman {
    pub async fn serve(mut routes: Vec<FakeRoute>) -> Self {
        let socket_path = format!(
            "/tmp/spawner-fake-podman-{:016x}.sock",
            rand::thread_rng().gen::<u64>()
        );
        let pending = routes
            .iter_mut()
            .filter_map(FakeRoute::completion_signal)
            .collect();
        let routes = Arc::new(Mutex::new(routes));
        let server = tokio::spawn(Self::run(socket_path.clone(), routes.clone()));

        while UnixStream::connect(&socket_path).await.is_err() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        log::debug!("Fake podman listening on '{socket_path}'");

        Self {
            socket_path,
            routes,
            server,
            pending,
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    async fn run(socket_path: String, routes: Routes) -> ServerResult {
        let make_service = make_service_fn(move |_| {
            let routes = routes.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |request| {
                    Self::dispatch(routes.clone(), request)
                }))
            }
        });
        Server::bind_unix(Path::new(&socket_path))?
            .serve(make_service)
            .await?;
        Ok(())
    }

    async fn dispatch(
        routes: Routes,
        request: Request<Body>,
    ) -> Result<Response<Body>, hyper::Error> {
        let method = request.method().clone();
        let uri = request.uri().to_string();
        let bytes = hyper::body::to_bytes(request.into_body()).await?;
        let body = serde_json::from_slice::<Value>(&bytes).unwrap_or(Value::Null);

        let mut routes = routes.lock().unwrap();
        let response = match routes.iter_mut().find(|route| route.matches(&method, &uri)) {
            Some(route) => {
                route.record(body);
                route.respond()
            }
            None => {
                log::warn!("Fake podman has no route for {method} '{uri}'");
                FakeRoute::new(method, uri)
                    .podman_error(StatusCode::NOT_IMPLEMENTED, "no route")
                    .respond()
            }
        };
        Ok(response)
    }

    /// Waits until every route with an expected call count got all its calls.
    pub async fn wait_for_expected_calls(&mut self) {
        for receiver in self.pending.drain(..) {
            let _ = receiver.await;
        }
    }

    pub fn verify(&self) {
        self.routes.lock().unwrap().iter().for_each(FakeRoute::verify);
    }
}

impl Drop for FakePodman {
    fn drop(&mut self) {
        self.server.abort();
        let _ = std::fs::remove_file(&self.socket_path);
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
    use hyper::{Body, Client, Method, Request, StatusCode};
    use hyperlocal::{UnixClientExt, Uri};
    use serde_json::json;

    use super::{FakePodman, FakeRoute};

    #[tokio::test(flavor = "multi_thread")]
    async fn utest_fake_podman_answers_unknown_request_with_501() {
        let fake = FakePodman::serve(Vec::new()).await;

        let url = Uri::new(fake.socket_path(), "/v4.0.0/libpod/unknown").into();
        let response = Client::unix().get(url).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn utest_fake_podman_routes_by_method_and_records_body() {
        let mut fake = FakePodman::serve(vec![FakeRoute::post("/libpod/volumes/create")
            .json(StatusCode::CREATED, json!({"Name": "data-alice"}))
            .once()
            .expect_body(|body| body["Name"] == "data-alice")])
        .await;

        let request = Request::builder()
            .method(Method::POST)
            .uri(Uri::new(fake.socket_path(), "/v4.0.0/libpod/volumes/create"))
            .body(Body::from(r#"{"Name":"data-alice"}"#))
            .unwrap();
        let response = Client::unix().request(request).await.unwrap();
        fake.wait_for_expected_calls().await;

        assert_eq!(response.status(), StatusCode::CREATED);
        fake.verify();
    }
}
