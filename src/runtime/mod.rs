use std::collections::HashMap;
use async_trait::async_trait;
use crate::error::Result;

pub mod cri;
pub mod mock;

pub use cri::CriRuntime;
pub use mock::{MockContainer, MockRuntime};

pub const DEFAULT_NAMESPACE: &str = "k8s.io";

pub const KIND_LABEL:           &str = "io.cri-containerd.kind";
pub const POD_NAME_LABEL:       &str = "io.kubernetes.pod.name";
pub const POD_NAMESPACE_LABEL:  &str = "io.kubernetes.pod.namespace";
pub const CONTAINER_NAME_LABEL: &str = "io.kubernetes.container.name";

pub const KIND_CONTAINER: &str = "container";
pub const KIND_SANDBOX:   &str = "sandbox";

pub type Labels = HashMap<String, String>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Task {
    pub pid: u32,
}

/// Something that can open a session with the container runtime.
/// Failing to connect must be reported as `Error::RuntimeUnavailable`.
#[async_trait]
pub trait Runtime: Send + Sync {
    type Client: RuntimeClient;

    fn endpoint(&self) -> String;

    async fn connect(&self) -> Result<Self::Client>;
}

/// One open session with the runtime. `containers` fails with
/// `Error::RuntimeUnavailable`, the per-container lookups with
/// `Error::ContainerLookupFailed`.
#[async_trait]
pub trait RuntimeClient: Send {
    async fn containers(&mut self, namespace: &str) -> Result<Vec<String>>;

    async fn task(&mut self, id: &str) -> Result<Task>;

    async fn labels(&mut self, id: &str) -> Result<Labels>;
}
