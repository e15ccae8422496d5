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

use std::convert::Infallible;

use futures_util::stream;
use hyper::{Body, Method, Response, StatusCode};
use serde_json::{json, Value};
use tokio::sync::oneshot;

type BodyCheck = dyn Fn(&Value) -> bool + Send + Sync;

enum Reply {
    Empty,
    Json(Value),
    JsonLines(Vec<Value>),
}

/// One canned endpoint of [`super::FakePodman`]. A route answers every
/// request whose method matches and whose uri contains `path`.
pub struct FakeRoute {
    method: Method,
    path: String,
    status: StatusCode,
    reply: Reply,
    expected_calls: Option<usize>,
    body_check: Option<Box<BodyCheck>>,
    received: Vec<Value>,
    all_received: Option<oneshot::Sender<()>>,
}

impl FakeRoute {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            status: StatusCode::OK,
            reply: Reply::Empty,
            expected_calls: None,
            body_check: None,
            received: Vec::new(),
            all_received: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn json(mut self, status: StatusCode, body: Value) -> Self {
        self.status = status;
        self.reply = Reply::Json(body);
        self
    }

    /// Error body in the shape the libpod API returns.
    pub fn podman_error(self, status: StatusCode, message: &str) -> Self {
        let body = json!({
            "cause": "",
            "message": message,
            "response": status.as_u16(),
        });
        self.json(status, body)
    }

    /// Streamed reply, one JSON document per line (image pulls).
    pub fn json_lines(mut self, lines: Vec<Value>) -> Self {
        self.reply = Reply::JsonLines(lines);
        self
    }

    pub fn times(mut self, expected_calls: usize) -> Self {
        self.expected_calls = Some(expected_calls);
        self
    }

    pub fn once(self) -> Self {
        self.times(1)
    }

    pub fn expect_body<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.body_check = Some(Box::new(check));
        self
    }

    pub(super) fn completion_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        match self.expected_calls {
            Some(count) if count > 0 => {
                let (sender, receiver) = oneshot::channel();
                self.all_received = Some(sender);
                Some(receiver)
            }
            _ => None,
        }
    }

    pub(super) fn matches(&self, method: &Method, uri: &str) -> bool {
        self.method == method && uri.contains(&self.path)
    }

    pub(super) fn record(&mut self, body: Value) {
        self.received.push(body);
        if self.expected_calls == Some(self.received.len()) {
            if let Some(sender) = self.all_received.take() {
                let _ = sender.send(());
            }
        }
    }

    pub(super) fn respond(&self) -> Response<Body> {
        let builder = Response::builder().status(self.status);
        let response = match &self.reply {
            Reply::Empty => builder.body(Body::empty()),
            Reply::Json(value) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(value.to_string())),
            Reply::JsonLines(lines) => {
                let chunks: Vec<Result<String, Infallible>> = lines
                    .iter()
                    .map(|line| Ok(format!("{line}\r\n")))
                    .collect();
                builder.body(Body::wrap_stream(stream::iter(chunks)))
            }
        };
        response.unwrap()
    }

    pub(super) fn verify(&self) {
        if let Some(expected) = self.expected_calls {
            assert_eq!(
                self.received.len(),
                expected,
                "{} '{}' was called {} times, expected {expected}",
                self.method,
                self.path,
                self.received.len()
            );
        }
        if let Some(check) = &self.body_check {
            for body in &self.received {
                assert!(
                    check(body),
                    "{} '{}' received an unexpected body: {body}",
                    self.method,
                    self.path
                );
            }
        }
    }
}

/// Body of `GET /libpod/containers/{name}/json`.
pub fn inspect_reply(container_id: &str, state: Value) -> Value {
    json!({
        "Id": container_id,
        "Name": "",
        "State": state,
    })
}
