//! In-memory runtime for tests and local runs without a container runtime.

use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;
use crate::error::{Error, Result};
use super::{
    CONTAINER_NAME_LABEL, KIND_CONTAINER, KIND_LABEL, KIND_SANDBOX, Labels,
    POD_NAME_LABEL, POD_NAMESPACE_LABEL, Runtime, RuntimeClient, Task,
};

#[derive(Clone, Default)]
pub struct MockRuntime {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    unavailable: bool,
    connects:    usize,
    namespace:   Option<String>,
    containers:  Vec<MockContainer>,
}

#[derive(Clone, Debug)]
pub struct MockContainer {
    pub id:     String,
    pub task:   Option<Task>,
    pub labels: Option<Labels>,
}

pub struct MockClient {
    state:      Arc<Mutex<State>>,
    containers: Vec<MockContainer>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, container: MockContainer) {
        self.state.lock().containers.push(container);
    }

    /// Adds a workload container labeled the way the kubelet labels them.
    pub fn pod(&self, id: &str, pid: u32, pod: &str, namespace: &str, container: &str) {
        let mut labels = Labels::new();
        labels.insert(KIND_LABEL.to_owned(), KIND_CONTAINER.to_owned());
        labels.insert(POD_NAME_LABEL.to_owned(), pod.to_owned());
        labels.insert(POD_NAMESPACE_LABEL.to_owned(), namespace.to_owned());
        labels.insert(CONTAINER_NAME_LABEL.to_owned(), container.to_owned());
        self.insert(MockContainer::new(id, pid, labels));
    }

    pub fn sandbox(&self, id: &str, pid: u32, pod: &str, namespace: &str) {
        let mut labels = Labels::new();
        labels.insert(KIND_LABEL.to_owned(), KIND_SANDBOX.to_owned());
        labels.insert(POD_NAME_LABEL.to_owned(), pod.to_owned());
        labels.insert(POD_NAMESPACE_LABEL.to_owned(), namespace.to_owned());
        self.insert(MockContainer::new(id, pid, labels));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Namespace passed to the most recent listing.
    pub fn namespace(&self) -> Option<String> {
        self.state.lock().namespace.clone()
    }
}

impl MockContainer {
    pub fn new(id: &str, pid: u32, labels: Labels) -> Self {
        Self {
            id:     id.to_owned(),
            task:   Some(Task { pid }),
            labels: Some(labels),
        }
    }

    pub fn without_task(mut self) -> Self {
        self.task = None;
        self
    }

    pub fn without_labels(mut self) -> Self {
        self.labels = None;
        self
    }
}

#[async_trait]
impl Runtime for MockRuntime {
    type Client = MockClient;

    fn endpoint(&self) -> String {
        "mock".to_owned()
    }

    async fn connect(&self) -> Result<MockClient> {
        let mut state = self.state.lock();
        state.connects += 1;

        if state.unavailable {
            return Err(Error::unavailable(self.endpoint(), "connection refused"));
        }

        Ok(MockClient {
            state:      self.state.clone(),
            containers: state.containers.clone(),
        })
    }
}

impl MockClient {
    fn find(&self, id: &str) -> Result<&MockContainer> {
        self.containers.iter().find(|c| c.id == id).ok_or_else(|| {
            Error::lookup(id, "not found")
        })
    }
}

#[async_trait]
impl RuntimeClient for MockClient {
    async fn containers(&mut self, namespace: &str) -> Result<Vec<String>> {
        self.state.lock().namespace = Some(namespace.to_owned());
        Ok(self.containers.iter().map(|c| c.id.clone()).collect())
    }

    async fn task(&mut self, id: &str) -> Result<Task> {
        self.find(id)?.task.ok_or_else(|| Error::lookup(id, "no running task"))
    }

    async fn labels(&mut self, id: &str) -> Result<Labels> {
        self.find(id)?.labels.clone().ok_or_else(|| Error::lookup(id, "labels unavailable"))
    }
}
