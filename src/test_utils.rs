// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Test utilities for mocking Kubernetes API responses.
//!
//! [`MockApiServer`] is a tower [`Service`] that a [`Client`] can be built
//! from. It holds one `ServiceInstance` as stateful storage with real
//! optimistic-concurrency behavior: writes must carry the current
//! `resourceVersion`, every accepted write bumps it, and conflicts can be
//! injected to exercise retry paths. All other paths are served from a
//! fixed response table, defaulting to `404`.

use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::api::DynamicObject;
use kube::client::Body;
use kube::{Client, ResourceExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

use crate::cluster::ClusterResolver;
use crate::constants::{API_GROUP, API_GROUP_VERSION, API_VERSION, KIND_SERVICE_INSTANCE};
use crate::crd::{InstanceCoordinates, ResourceReference, ServiceInstance};
use crate::error::{Error, Result};
use crate::manager::{ComputedStatus, ResourceAction, ResourceManager};

#[derive(Default)]
struct MockState {
    /// The instance under test, stored as raw JSON
    instance: Option<Value>,
    /// Path of the stored instance (empty when no instance is stored)
    instance_path: String,
    resource_version: u64,
    /// Mutating requests observed, in order: (method, path)
    writes: Vec<(String, String)>,
    /// Number of upcoming instance writes to reject with `409`
    conflicts: u32,
    /// Number of upcoming instance GETs to reject with `500`
    get_errors: u32,
    /// Fixed responses for non-instance paths: (method, path) -> (status, body)
    responses: HashMap<(String, String), (u16, String)>,
}

/// A mock API server holding one `ServiceInstance` plus canned responses.
#[derive(Clone, Default)]
pub struct MockApiServer {
    state: Arc<Mutex<MockState>>,
}

impl MockApiServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a server already storing the given instance at `resourceVersion` 1.
    #[must_use]
    pub fn with_instance(instance: &ServiceInstance) -> Self {
        let server = Self::new();
        server.put_instance(instance);
        server
    }

    /// Store (or replace) the instance, resetting its `resourceVersion` to 1.
    pub fn put_instance(&self, instance: &ServiceInstance) {
        let namespace = instance.namespace().unwrap_or_else(|| "default".to_string());
        let name = instance.name_any();
        let mut value = serde_json::to_value(instance).unwrap();
        value["apiVersion"] = json!(API_GROUP_VERSION);
        value["kind"] = json!(KIND_SERVICE_INSTANCE);
        value["metadata"]["resourceVersion"] = json!("1");

        let mut state = self.state.lock().unwrap();
        state.instance_path = instance_path(&namespace, &name);
        state.resource_version = 1;
        state.instance = Some(value);
    }

    /// Add a response for requests matching the method and exact path
    #[must_use]
    pub fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.state.lock().unwrap().responses.insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Add a response for GET requests matching the exact path
    #[must_use]
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Reject the next `count` instance writes with `409 Conflict`
    pub fn inject_conflicts(&self, count: u32) {
        self.state.lock().unwrap().conflicts = count;
    }

    /// Reject the next `count` instance GETs with `500`
    pub fn inject_get_errors(&self, count: u32) {
        self.state.lock().unwrap().get_errors = count;
    }

    /// Build a kube Client backed by this server
    #[must_use]
    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    /// The stored instance as currently persisted, if any
    #[must_use]
    pub fn instance(&self) -> Option<ServiceInstance> {
        let state = self.state.lock().unwrap();
        state
            .instance
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    /// All mutating requests observed so far, in order
    #[must_use]
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Number of mutating requests observed so far
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }
}

fn instance_path(namespace: &str, name: &str) -> String {
    format!("/apis/{API_GROUP}/{API_VERSION}/namespaces/{namespace}/serviceinstances/{name}")
}

fn json_response(status: u16, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.into_bytes()))
        .unwrap()
}

/// Create a 404 Status response body
#[must_use]
pub fn not_found_json(resource: &str, name: &str) -> String {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{resource} \"{name}\" not found"),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a 500 Status response body
#[must_use]
pub fn internal_error_json(name: &str) -> String {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("Internal error occurred: failed to get serviceinstance \"{name}\""),
        "reason": "InternalError",
        "code": 500
    })
    .to_string()
}

/// Create a 409 Status response body
#[must_use]
pub fn conflict_json(name: &str) -> String {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!(
            "Operation cannot be fulfilled on serviceinstances.{API_GROUP} \"{name}\": \
             the object has been modified; please apply your changes to the latest \
             version and try again"
        ),
        "reason": "Conflict",
        "code": 409
    })
    .to_string()
}

fn handle(state: &Mutex<MockState>, method: &str, path: &str, body: &[u8]) -> Response<Body> {
    let mut state = state.lock().unwrap();

    if method != "GET" {
        state.writes.push((method.to_string(), path.to_string()));
    }

    let main_path = state.instance_path.clone();
    let status_path = format!("{main_path}/status");

    if !main_path.is_empty() && (path == main_path || path == status_path) {
        return handle_instance(&mut state, method, path == status_path, body);
    }

    // Everything else is served from the canned table, exact match first
    // then prefix match for list-style paths.
    let lookup = state
        .responses
        .get(&(method.to_string(), path.to_string()))
        .cloned()
        .or_else(|| {
            state
                .responses
                .iter()
                .find(|((m, p), _)| m == method && path.starts_with(p.as_str()))
                .map(|(_, resp)| resp.clone())
        });

    match lookup {
        Some((status, body)) => json_response(status, body),
        None => json_response(404, not_found_json("resource", path)),
    }
}

fn handle_instance(
    state: &mut MockState,
    method: &str,
    status_subresource: bool,
    body: &[u8],
) -> Response<Body> {
    let name = state
        .instance
        .as_ref()
        .and_then(|v| v["metadata"]["name"].as_str())
        .unwrap_or_default()
        .to_string();

    match method {
        "GET" => {
            if state.get_errors > 0 {
                state.get_errors -= 1;
                return json_response(500, internal_error_json(&name));
            }
            match &state.instance {
                Some(value) => json_response(200, value.to_string()),
                None => json_response(404, not_found_json("serviceinstances", &name)),
            }
        }
        "PUT" => {
            if state.conflicts > 0 {
                state.conflicts -= 1;
                return json_response(409, conflict_json(&name));
            }
            let Some(stored) = state.instance.clone() else {
                return json_response(404, not_found_json("serviceinstances", &name));
            };
            let Ok(payload) = serde_json::from_slice::<Value>(body) else {
                return json_response(400, "bad request body".to_string());
            };

            // Optimistic concurrency: a payload carrying a resourceVersion
            // must carry the current one.
            if let Some(sent) = payload["metadata"]["resourceVersion"].as_str() {
                if !sent.is_empty() && sent != state.resource_version.to_string() {
                    return json_response(409, conflict_json(&name));
                }
            }

            state.resource_version += 1;
            let mut updated = if status_subresource {
                // A status PUT only replaces the status subtree.
                let mut next = stored;
                next["status"] = payload["status"].clone();
                next
            } else {
                // A main-resource PUT replaces everything except the status
                // subtree, which is owned by the status endpoint.
                let mut next = payload;
                next["status"] = stored["status"].clone();
                next
            };
            updated["apiVersion"] = json!(API_GROUP_VERSION);
            updated["kind"] = json!(KIND_SERVICE_INSTANCE);
            updated["metadata"]["resourceVersion"] = json!(state.resource_version.to_string());

            let response = json_response(200, updated.to_string());
            state.instance = Some(updated);
            response
        }
        "DELETE" => match state.instance.take() {
            Some(value) => json_response(200, value.to_string()),
            None => json_response(404, not_found_json("serviceinstances", &name)),
        },
        _ => json_response(405, "method not allowed".to_string()),
    }
}

impl Service<Request<Body>> for MockApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<
            dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>>
                + Send,
        >,
    >;

    fn poll_ready(
        &mut self,
        _cx: &mut Context<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let method = req.method().to_string();
            let path = req.uri().path().to_string();
            let body = req.into_body().collect().await?.to_bytes();
            Ok(handle(&state, &method, &path, &body))
        })
    }
}

/// A minimal ConfigMap JSON body for plan stubs
#[must_use]
pub fn config_map_json(namespace: &str, name: &str, data: &[(&str, &str)]) -> String {
    let mut map = serde_json::Map::new();
    for (key, value) in data {
        map.insert((*key).to_string(), json!(value));
    }
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "name": name, "namespace": namespace },
        "data": Value::Object(map)
    })
    .to_string()
}

/// Cluster resolver handing out one fixed client
pub struct StaticClusterResolver {
    target: Client,
}

impl StaticClusterResolver {
    #[must_use]
    pub fn new(target: Client) -> Self {
        Self { target }
    }
}

#[async_trait]
impl ClusterResolver for StaticClusterResolver {
    async fn get_cluster(&self, _coordinates: &InstanceCoordinates) -> Result<Client> {
        Ok(self.target.clone())
    }
}

/// Cluster resolver that always fails
pub struct FailingClusterResolver;

#[async_trait]
impl ClusterResolver for FailingClusterResolver {
    async fn get_cluster(&self, coordinates: &InstanceCoordinates) -> Result<Client> {
        Err(Error::Kubeconfig(format!(
            "no cluster for instance {}",
            coordinates.instance_id
        )))
    }
}

/// Scriptable [`ResourceManager`] for reconciler tests.
///
/// Every method records its invocation and returns the scripted value, or
/// fails when a failure has been armed for it via [`Self::fail`].
#[derive(Default)]
pub struct ScriptedResourceManager {
    /// Objects returned by `compute_expected_resources`
    pub expected: Mutex<Vec<DynamicObject>>,
    /// References returned by `reconcile_resources`
    pub reconciled: Mutex<Vec<ResourceReference>>,
    /// References returned by `delete_sub_resources` (not yet confirmed gone)
    pub undeleted: Mutex<Vec<ResourceReference>>,
    /// Aggregate returned by `compute_status`
    pub computed: Mutex<ComputedStatus>,
    /// Operations armed to fail, by method name
    failures: Mutex<HashMap<&'static str, String>>,
    /// Method invocations observed, in order
    calls: Mutex<Vec<String>>,
}

impl ScriptedResourceManager {
    /// Make the named method fail with the given message until cleared
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, message.to_string());
    }

    /// Clear all armed failures
    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Method invocations observed so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, operation: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(operation.to_string());
        if let Some(message) = self.failures.lock().unwrap().get(operation) {
            return Err(Error::Other(anyhow::anyhow!("{message}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceManager for ScriptedResourceManager {
    async fn compute_expected_resources(
        &self,
        _source: &Client,
        _coordinates: &InstanceCoordinates,
        _action: ResourceAction,
        _namespace: &str,
    ) -> Result<Vec<DynamicObject>> {
        self.enter("compute_expected_resources")?;
        Ok(self.expected.lock().unwrap().clone())
    }

    fn set_owner_reference(
        &self,
        _owner: &ServiceInstance,
        _resources: &mut [DynamicObject],
    ) -> Result<()> {
        self.enter("set_owner_reference")
    }

    async fn reconcile_resources(
        &self,
        _source: &Client,
        _target: &Client,
        _expected: Vec<DynamicObject>,
        _last_known: &[ResourceReference],
    ) -> Result<Vec<ResourceReference>> {
        self.enter("reconcile_resources")?;
        Ok(self.reconciled.lock().unwrap().clone())
    }

    async fn delete_sub_resources(
        &self,
        _target: &Client,
        _resources: &[ResourceReference],
    ) -> Result<Vec<ResourceReference>> {
        self.enter("delete_sub_resources")?;
        Ok(self.undeleted.lock().unwrap().clone())
    }

    async fn compute_status(
        &self,
        _source: &Client,
        _target: &Client,
        _coordinates: &InstanceCoordinates,
        _action: ResourceAction,
        _namespace: &str,
    ) -> Result<ComputedStatus> {
        self.enter("compute_status")?;
        Ok(self.computed.lock().unwrap().clone())
    }
}
