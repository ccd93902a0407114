use std::collections::HashMap;
use std::path::PathBuf;
use async_trait::async_trait;
use k8s_cri::v1alpha2::runtime_service_client::RuntimeServiceClient;
use k8s_cri::v1alpha2::{
    ContainerState, ContainerStatusRequest, ListContainersRequest,
    ListPodSandboxRequest, PodSandboxState, PodSandboxStatusRequest,
};
use log::debug;
use serde::Deserialize;
use tokio::net::UnixStream;
use tonic::Request;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use crate::error::{Error, Result};
use super::{KIND_CONTAINER, KIND_LABEL, KIND_SANDBOX, Labels, Runtime, RuntimeClient, Task};

pub const DEFAULT_ENDPOINT: &str = "/run/containerd/containerd.sock";

const NAMESPACE_HEADER: &str = "containerd-namespace";

/// containerd's CRI service on a unix socket.
#[derive(Clone, Debug)]
pub struct CriRuntime {
    socket: PathBuf,
}

pub struct CriClient {
    client:    RuntimeServiceClient<Channel>,
    endpoint:  String,
    namespace: String,
    entries:   HashMap<String, Entry>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Kind {
    Sandbox,
    Container,
}

struct Entry {
    kind:   Kind,
    labels: Labels,
}

#[derive(Deserialize)]
struct Info {
    #[serde(default)]
    pid: u32,
}

impl CriRuntime {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self { socket: socket.into() }
    }
}

impl Default for CriRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[async_trait]
impl Runtime for CriRuntime {
    type Client = CriClient;

    fn endpoint(&self) -> String {
        self.socket.display().to_string()
    }

    async fn connect(&self) -> Result<CriClient> {
        let path = self.socket.clone();

        // the authority is ignored, every connection goes to the socket
        let channel = Endpoint::from_static("http://[::]:50051")
            .connect_with_connector(service_fn(move |_: Uri| {
                UnixStream::connect(path.clone())
            }))
            .await
            .map_err(|e| Error::unavailable(self.endpoint(), e))?;

        debug!("connected to {}", self.endpoint());

        Ok(CriClient {
            client:    RuntimeServiceClient::new(channel),
            endpoint:  self.endpoint(),
            namespace: String::new(),
            entries:   HashMap::new(),
        })
    }
}

impl CriClient {
    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Ok(value) = MetadataValue::try_from_bytes(self.namespace.as_bytes()) {
            request.metadata_mut().insert(NAMESPACE_HEADER, value);
        }
        request
    }

    fn kind(&self, id: &str) -> Result<Kind> {
        match self.entries.get(id) {
            Some(entry) => Ok(entry.kind),
            None        => Err(Error::lookup(id, "not listed by the runtime")),
        }
    }
}

#[async_trait]
impl RuntimeClient for CriClient {
    async fn containers(&mut self, namespace: &str) -> Result<Vec<String>> {
        self.namespace = namespace.to_owned();
        self.entries.clear();

        let request   = self.request(ListPodSandboxRequest::default());
        let sandboxes = self.client.list_pod_sandbox(request).await.map_err(|e| {
            Error::unavailable(self.endpoint.clone(), e)
        })?.into_inner().items;

        let request    = self.request(ListContainersRequest::default());
        let containers = self.client.list_containers(request).await.map_err(|e| {
            Error::unavailable(self.endpoint.clone(), e)
        })?.into_inner().containers;

        let mut ids = Vec::with_capacity(sandboxes.len() + containers.len());

        for s in sandboxes {
            ids.push(s.id.clone());
            self.entries.insert(s.id, Entry { kind: Kind::Sandbox, labels: s.labels });
        }

        for c in containers {
            ids.push(c.id.clone());
            self.entries.insert(c.id, Entry { kind: Kind::Container, labels: c.labels });
        }

        Ok(ids)
    }

    async fn task(&mut self, id: &str) -> Result<Task> {
        let (running, info) = match self.kind(id)? {
            Kind::Container => {
                let request = self.request(ContainerStatusRequest {
                    container_id: id.to_owned(),
                    verbose:      true,
                    ..Default::default()
                });
                let response = self.client.container_status(request).await.map_err(|e| {
                    Error::lookup(id, e)
                })?.into_inner();
                let running = response.status.map_or(false, |s| {
                    s.state == ContainerState::ContainerRunning as i32
                });
                (running, response.info)
            }
            Kind::Sandbox => {
                let request = self.request(PodSandboxStatusRequest {
                    pod_sandbox_id: id.to_owned(),
                    verbose:        true,
                    ..Default::default()
                });
                let response = self.client.pod_sandbox_status(request).await.map_err(|e| {
                    Error::lookup(id, e)
                })?.into_inner();
                let running = response.status.map_or(false, |s| {
                    s.state == PodSandboxState::SandboxReady as i32
                });
                (running, response.info)
            }
        };

        if !running {
            return Err(Error::lookup(id, "no running task"));
        }

        pid(id, &info)
    }

    async fn labels(&mut self, id: &str) -> Result<Labels> {
        let entry = self.entries.get(id).ok_or_else(|| {
            Error::lookup(id, "not listed by the runtime")
        })?;

        let kind = match entry.kind {
            Kind::Container => KIND_CONTAINER,
            Kind::Sandbox   => KIND_SANDBOX,
        };

        let mut labels = entry.labels.clone();
        labels.insert(KIND_LABEL.to_owned(), kind.to_owned());

        Ok(labels)
    }
}

/// Extracts the task pid from the verbose status `info` document.
fn pid(id: &str, info: &HashMap<String, String>) -> Result<Task> {
    let json = info.get("info").ok_or_else(|| {
        Error::lookup(id, "verbose status carries no info")
    })?;

    let info = serde_json::from_str::<Info>(json).map_err(|e| Error::lookup(id, e))?;

    Ok(Task { pid: info.pid })
}
