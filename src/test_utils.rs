// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory Kubernetes API server for exercising kube clients in tests.
//!
//! Objects are stored by their REST path. GET on a collection lists the
//! objects below it (filtered by equality label selectors), POST creates,
//! PUT replaces with optimistic concurrency on `resourceVersion`, DELETE
//! removes. Services get a cluster IP on create and reject updates that
//! change it, like a real API server does.

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

const COLLECTIONS: [&str; 4] = ["deployments", "services", "routes", "namespaces"];

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<String, Value>,
    failures: Vec<(String, String, u16)>,
    requests: Vec<(String, String)>,
    next_version: u64,
}

/// Stateful fake API server; clones share the same store
#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a kube Client talking to this fake
    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    /// Seed an object at its item path, e.g.
    /// `/apis/apps/v1/namespaces/previews/deployments/web-pr-1`
    pub fn insert(&self, path: &str, mut object: Value) {
        let mut state = self.state.lock().unwrap();
        state.stamp(path, &mut object, None);
        state.objects.insert(path.to_string(), object);
    }

    /// Answer every request with `method` whose path starts with `path_prefix`
    /// with the given error status
    pub fn fail(&self, method: &str, path_prefix: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((method.to_string(), path_prefix.to_string(), status));
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().objects.contains_key(path)
    }

    /// All (method, path) pairs received so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|(m, _)| m == method).count()
    }
}

impl FakeState {
    fn handle(&mut self, method: &str, path: &str, query: &str, body: &[u8]) -> (u16, Value) {
        self.requests.push((method.to_string(), path.to_string()));

        if let Some((_, _, status)) = self
            .failures
            .iter()
            .find(|(m, p, _)| m == method && path.starts_with(p.as_str()))
        {
            return (*status, status_json(*status, "Failure", "injected failure"));
        }

        match method {
            "GET" => self.get(path, query),
            "POST" => self.create(path, body),
            "PUT" => self.replace(path, body),
            "DELETE" => self.delete(path),
            _ => (405, status_json(405, "MethodNotAllowed", "method not allowed")),
        }
    }

    fn get(&self, path: &str, query: &str) -> (u16, Value) {
        if let Some(object) = self.objects.get(path) {
            return (200, object.clone());
        }
        if !is_collection(path) {
            return (404, not_found(path));
        }

        let selector = label_selector(query);
        let items: Vec<Value> = self
            .objects
            .iter()
            .filter(|(key, _)| in_collection(key, path))
            .filter(|(_, object)| matches_selector(object, &selector))
            .map(|(_, object)| object.clone())
            .collect();

        (
            200,
            json!({
                "apiVersion": "v1",
                "kind": "List",
                "metadata": {"resourceVersion": self.next_version.to_string()},
                "items": items,
            }),
        )
    }

    fn create(&mut self, collection: &str, body: &[u8]) -> (u16, Value) {
        let Ok(mut object) = serde_json::from_slice::<Value>(body) else {
            return (400, status_json(400, "BadRequest", "invalid body"));
        };
        let Some(name) = object["metadata"]["name"].as_str().map(str::to_string) else {
            return (422, status_json(422, "Invalid", "metadata.name is required"));
        };

        let path = format!("{}/{}", collection, name);
        if self.objects.contains_key(&path) {
            return (409, status_json(409, "AlreadyExists", "already exists"));
        }

        if collection.ends_with("/services") && object["spec"]["clusterIP"].as_str().is_none() {
            let ip = format!("10.96.0.{}", self.objects.len() + 10);
            object["spec"]["clusterIP"] = json!(ip);
            object["spec"]["clusterIPs"] = json!([ip]);
        }

        self.stamp(&path, &mut object, None);
        self.objects.insert(path, object.clone());
        (201, object)
    }

    fn replace(&mut self, path: &str, body: &[u8]) -> (u16, Value) {
        let Ok(mut object) = serde_json::from_slice::<Value>(body) else {
            return (400, status_json(400, "BadRequest", "invalid body"));
        };
        let Some(existing) = self.objects.get(path).cloned() else {
            return (404, not_found(path));
        };

        if object["metadata"]["resourceVersion"] != existing["metadata"]["resourceVersion"] {
            return (409, status_json(409, "Conflict", "resourceVersion mismatch"));
        }
        if path.contains("/services/") && object["spec"]["clusterIP"] != existing["spec"]["clusterIP"] {
            return (
                422,
                status_json(422, "Invalid", "spec.clusterIP: field is immutable"),
            );
        }

        self.stamp(path, &mut object, Some(&existing));
        self.objects.insert(path.to_string(), object.clone());
        (200, object)
    }

    fn delete(&mut self, path: &str) -> (u16, Value) {
        let Some(object) = self.objects.remove(path) else {
            return (404, not_found(path));
        };

        // Namespace deletion takes everything inside it along
        if let Some(name) = path.strip_prefix("/api/v1/namespaces/") {
            let marker = format!("/namespaces/{}/", name);
            self.objects.retain(|key, _| !key.contains(&marker));
        }

        (200, object)
    }

    fn stamp(&mut self, path: &str, object: &mut Value, existing: Option<&Value>) {
        self.next_version += 1;
        let metadata = &mut object["metadata"];
        metadata["resourceVersion"] = json!(self.next_version.to_string());

        match existing {
            Some(existing) => {
                metadata["uid"] = existing["metadata"]["uid"].clone();
                metadata["creationTimestamp"] = existing["metadata"]["creationTimestamp"].clone();
            }
            None => {
                metadata["uid"] = json!(format!("uid-{}", self.next_version));
                if metadata["creationTimestamp"].is_null() {
                    metadata["creationTimestamp"] = json!(chrono::Utc::now()
                        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
                }
            }
        }

        if let Some(namespace) = namespace_of(path) {
            metadata["namespace"] = json!(namespace);
        }
    }
}

fn is_collection(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|last| COLLECTIONS.contains(&last))
}

fn namespace_of(path: &str) -> Option<&str> {
    let (_, rest) = path.split_once("/namespaces/")?;
    let (namespace, _) = rest.split_once('/')?;
    Some(namespace)
}

/// Whether the object stored at `key` is listed by `collection`, including
/// cluster-wide lists such as `/apis/apps/v1/deployments`
fn in_collection(key: &str, collection: &str) -> bool {
    let Some((parent, _)) = key.rsplit_once('/') else {
        return false;
    };
    if parent == collection {
        return true;
    }

    let Some((prefix, plural)) = collection.rsplit_once('/') else {
        return false;
    };
    if plural == "namespaces" {
        return false;
    }
    parent
        .strip_prefix(&format!("{}/namespaces/", prefix))
        .and_then(|rest| rest.strip_suffix(&format!("/{}", plural)))
        .is_some_and(|namespace| !namespace.contains('/'))
}

fn label_selector(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "labelSelector")
        .flat_map(|(_, value)| {
            value
                .split(',')
                .filter_map(|term| term.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn matches_selector(object: &Value, selector: &[(String, String)]) -> bool {
    selector
        .iter()
        .all(|(key, value)| object["metadata"]["labels"][key].as_str() == Some(value.as_str()))
}

impl Service<Request<Body>> for FakeApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body: Bytes = body.collect().await?.to_bytes();

            let (status, value) = state.lock().unwrap().handle(
                parts.method.as_str(),
                parts.uri.path(),
                parts.uri.query().unwrap_or_default(),
                &body,
            );

            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(value.to_string().into_bytes()))
                .unwrap())
        })
    }
}

fn status_json(code: u16, reason: &str, message: &str) -> Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
}

/// Create a 404 not found response body
pub fn not_found(path: &str) -> Value {
    status_json(404, "NotFound", &format!("{} not found", path))
}

/// Item path of a namespaced Deployment
pub fn deployment_path(namespace: &str, name: &str) -> String {
    format!("/apis/apps/v1/namespaces/{}/deployments/{}", namespace, name)
}

pub fn service_path(namespace: &str, name: &str) -> String {
    format!("/api/v1/namespaces/{}/services/{}", namespace, name)
}

pub fn route_path(namespace: &str, name: &str) -> String {
    format!(
        "/apis/route.openshift.io/v1/namespaces/{}/routes/{}",
        namespace, name
    )
}

pub fn namespace_path(name: &str) -> String {
    format!("/api/v1/namespaces/{}", name)
}

/// Minimal Deployment JSON as the API server would return it
pub fn deployment_json(
    namespace: &str,
    name: &str,
    labels: &[(&str, &str)],
    annotations: &[(&str, &str)],
    created: &str,
) -> Value {
    let labels: BTreeMap<&str, &str> = labels.iter().copied().collect();
    let annotations: BTreeMap<&str, &str> = annotations.iter().copied().collect();
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "labels": labels,
            "annotations": annotations,
            "creationTimestamp": created,
        },
        "spec": {
            "selector": {"matchLabels": labels},
            "template": {"spec": {"containers": [{"name": name}]}}
        }
    })
}

/// Create a mock namespace JSON object
pub fn namespace_json(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
        }
    })
}

/// Canned answer of the HTTP stub
#[derive(Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::new(200, body)
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    /// JSON body, `Value::Null` when the body is not JSON
    pub body: Value,
}

#[derive(Clone, Default)]
struct StubState {
    responses: Arc<Mutex<std::collections::VecDeque<StubResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Local HTTP server answering requests with queued responses in order
pub struct HttpStub {
    pub base_url: String,
    state: StubState,
}

impl HttpStub {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

/// Start an HTTP stub on a random local port. Once the queue is exhausted
/// it answers `200 {}`.
pub async fn spawn_http_stub(responses: Vec<StubResponse>) -> HttpStub {
    use axum::extract::State;
    use axum::response::IntoResponse;

    async fn handle(
        State(state): State<StubState>,
        method: http::Method,
        uri: http::Uri,
        headers: http::HeaderMap,
        body: Bytes,
    ) -> axum::response::Response {
        state.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            authorization: headers
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        });

        let next = state
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StubResponse::ok("{}"));
        (
            http::StatusCode::from_u16(next.status).unwrap(),
            [(http::header::CONTENT_TYPE, "application/json")],
            next.body,
        )
            .into_response()
    }

    let state = StubState {
        responses: Arc::new(Mutex::new(responses.into())),
        ..Default::default()
    };
    let router = axum::Router::new()
        .fallback(handle)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    HttpStub { base_url, state }
}
