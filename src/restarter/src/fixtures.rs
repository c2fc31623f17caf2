//! Helper methods only available for tests
use http::{Method, Request, Response, StatusCode};
use hyper::Body;
use k8s_openapi::{
    api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec},
    api::core::v1::{Container, Pod, PodSpec, PodTemplateSpec},
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference},
};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::task::JoinHandle;

pub fn pod(namespace: &str, name: &str, owners: &[(&str, &str, bool)]) -> Pod {
    let owner_references = owners
        .iter()
        .map(|(kind, owner, controller)| OwnerReference {
            api_version: "apps/v1".into(),
            kind: (*kind).into(),
            name: (*owner).into(),
            uid: format!("uid-{owner}"),
            controller: Some(*controller),
            ..Default::default()
        })
        .collect::<Vec<_>>();
    Pod {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            owner_references: (!owner_references.is_empty()).then_some(owner_references),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

fn pod_template(name: &str, annotations: &[(&str, &str)]) -> PodTemplateSpec {
    let annotations = annotations
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect::<BTreeMap<_, _>>();
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels(name)),
            annotations: (!annotations.is_empty()).then_some(annotations),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "main".into(),
                image: Some("postgres:16".into()),
                ..Default::default()
            }],
            ..Default::default()
        }),
    }
}

fn object_meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: Some(namespace.into()),
        resource_version: Some("1".into()),
        labels: Some(labels(name)),
        ..Default::default()
    }
}

pub fn deployment(namespace: &str, name: &str, template_annotations: &[(&str, &str)]) -> Deployment {
    Deployment {
        metadata: object_meta(namespace, name),
        spec: Some(DeploymentSpec {
            replicas: Some(2),
            selector: LabelSelector {
                match_labels: Some(labels(name)),
                ..Default::default()
            },
            template: pod_template(name, template_annotations),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn stateful_set(namespace: &str, name: &str, template_annotations: &[(&str, &str)]) -> StatefulSet {
    StatefulSet {
        metadata: object_meta(namespace, name),
        spec: Some(StatefulSetSpec {
            replicas: Some(3),
            service_name: name.into(),
            selector: LabelSelector {
                match_labels: Some(labels(name)),
                ..Default::default()
            },
            template: pod_template(name, template_annotations),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The path kube addresses a single namespaced object at
pub fn object_path<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> String {
    format!("{}/{}", K::url_path(&(), Some(namespace)), name)
}

const PODS_PATH: &str = "/api/v1/pods";

struct Failure {
    method: Method,
    path: String,
    query: Option<String>,
    status: u16,
    reason: String,
}

/// In-memory objects served by the fake apiserver
#[derive(Default)]
pub struct ClusterState {
    pub pods: Vec<Value>,
    /// Objects keyed by their api path
    pub objects: BTreeMap<String, Value>,
    failures: Vec<Failure>,
}

impl ClusterState {
    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.pods.push(serde_json::to_value(pod).unwrap());
        self
    }

    pub fn with_object<K>(mut self, object: K) -> Self
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let path = object_path::<K>(&object.namespace().unwrap(), &object.name_any());
        self.objects.insert(path, serde_json::to_value(object).unwrap());
        self
    }

    /// Answer the next `method` request on `path` with an error status
    pub fn fail_next(self, method: Method, path: &str, status: u16, reason: &str) -> Self {
        self.push_failure(method, path, None, status, reason)
    }

    /// Like `fail_next`, restricted to requests whose query contains `query`
    pub fn fail_next_matching(self, method: Method, path: &str, query: &str, status: u16, reason: &str) -> Self {
        self.push_failure(method, path, Some(query.to_string()), status, reason)
    }

    fn push_failure(mut self, method: Method, path: &str, query: Option<String>, status: u16, reason: &str) -> Self {
        self.failures.push(Failure {
            method,
            path: path.to_string(),
            query,
            status,
            reason: reason.to_string(),
        });
        self
    }

    fn handle(&mut self, method: &Method, path: &str, query: &str, body: &Value) -> (u16, Value) {
        let failure = self.failures.iter().position(|f| {
            f.method == *method && f.path == path && f.query.as_deref().map_or(true, |q| query.contains(q))
        });
        if let Some(index) = failure {
            let failure = self.failures.remove(index);
            return (failure.status, status(failure.status, &failure.reason));
        }

        match *method {
            Method::GET if path == PODS_PATH => (200, self.list_pods(query)),
            Method::GET => match self.objects.get(path) {
                Some(object) => (200, object.clone()),
                None => (404, status(404, "NotFound")),
            },
            Method::PUT => self.replace(path, query, body),
            _ => (405, status(405, "MethodNotAllowed")),
        }
    }

    fn list_pods(&self, query: &str) -> Value {
        let params = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect::<BTreeMap<_, _>>();
        let start = params
            .get("continue")
            .and_then(|token| token.parse::<usize>().ok())
            .unwrap_or(0)
            .min(self.pods.len());
        let limit = params
            .get("limit")
            .and_then(|limit| limit.parse::<usize>().ok())
            .unwrap_or(self.pods.len());
        let end = (start + limit).min(self.pods.len());

        let mut metadata = json!({ "resourceVersion": "1" });
        if end < self.pods.len() {
            metadata["continue"] = end.to_string().into();
        }
        json!({
            "apiVersion": "v1",
            "kind": "PodList",
            "metadata": metadata,
            "items": self.pods[start..end],
        })
    }

    fn replace(&mut self, path: &str, query: &str, body: &Value) -> (u16, Value) {
        let Some(stored) = self.objects.get(path) else {
            return (404, status(404, "NotFound"));
        };
        let stored_version = stored["metadata"]["resourceVersion"].as_str().unwrap_or("0");
        if let Some(sent_version) = body["metadata"]["resourceVersion"].as_str() {
            if sent_version != stored_version {
                return (409, status(409, "Conflict"));
            }
        }

        let next_version = stored_version.parse::<u64>().unwrap_or(0) + 1;
        let mut updated = body.clone();
        updated["metadata"]["resourceVersion"] = next_version.to_string().into();
        if query.contains("dryRun=All") {
            return (200, updated);
        }
        self.objects.insert(path.to_string(), updated.clone());
        (200, updated)
    }
}

fn status(code: u16, reason: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Status",
        "metadata": {},
        "status": "Failure",
        "message": format!("simulated {reason}"),
        "reason": reason,
        "code": code,
    })
}

/// A request as seen by the fake apiserver
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: Value,
}

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

/// Serves a `ClusterState` to a mocked kube client until every client clone is dropped
pub struct ApiServerVerifier {
    handle: ApiServerHandle,
    state: ClusterState,
}

pub fn mock_cluster(state: ClusterState) -> (Client, ApiServerVerifier) {
    let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    let client = Client::new(mock_service, "default");
    (client, ApiServerVerifier { handle, state })
}

impl ApiServerVerifier {
    /// Answer requests in the background, returning the final state and every request seen
    pub fn run(mut self) -> JoinHandle<(ClusterState, Vec<RecordedRequest>)> {
        tokio::spawn(async move {
            let mut requests = Vec::new();
            while let Some((request, send)) = self.handle.next_request().await {
                let (parts, body) = request.into_parts();
                let bytes = hyper::body::to_bytes(body).await.unwrap();
                let body: Value = if bytes.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_slice(&bytes).unwrap()
                };
                let path = parts.uri.path().to_string();
                let query = parts.uri.query().unwrap_or_default().to_string();

                let (code, response) = self.state.handle(&parts.method, &path, &query, &body);
                send.send_response(
                    Response::builder()
                        .status(StatusCode::from_u16(code).unwrap())
                        .body(Body::from(serde_json::to_vec(&response).unwrap()))
                        .unwrap(),
                );
                requests.push(RecordedRequest {
                    method: parts.method,
                    path,
                    query,
                    body,
                });
            }
            (self.state, requests)
        })
    }
}

pub async fn timeout_after_1s<T>(handle: JoinHandle<T>) -> T {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario succeeded")
}
