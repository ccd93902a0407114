use std::path::PathBuf;
use std::time::Instant;
use log::{debug, trace};
use procfs::process::Process;
use crate::data::ContainerIdentity;
use crate::error::Result;
use crate::runtime::{
    CONTAINER_NAME_LABEL, KIND_CONTAINER, KIND_LABEL, Labels,
    POD_NAME_LABEL, POD_NAMESPACE_LABEL, Runtime, RuntimeClient,
};

/// Maps the runtime's workload containers to their init process. Every
/// call starts from a fresh runtime connection, nothing is cached.
pub struct Resolver<R> {
    runtime:   R,
    namespace: String,
    proc_root: PathBuf,
}

impl<R: Runtime> Resolver<R> {
    pub fn new(runtime: R, namespace: impl Into<String>, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            namespace: namespace.into(),
            proc_root: proc_root.into(),
        }
    }

    pub async fn resolve(&self) -> Result<Vec<ContainerIdentity>> {
        let start = Instant::now();

        let mut client = self.runtime.connect().await?;
        let ids = client.containers(&self.namespace).await?;

        debug!("runtime {} lists {} containers", self.runtime.endpoint(), ids.len());

        let mut found   = Vec::new();
        let mut skipped = 0;

        for id in ids {
            match self.lookup(&mut client, &id).await {
                Ok(Some(c)) => {
                    trace!("added {}/{}/{} pid {}", c.pod_namespace, c.pod_name, c.container, c.pid);
                    found.push(c);
                }
                Ok(None) => skipped += 1,
                Err(e)   => {
                    debug!("skipping container {}: {}", id, e);
                    skipped += 1;
                }
            }
        }

        debug!("resolved {} containers, skipped {} in {:?}", found.len(), skipped, start.elapsed());

        Ok(found)
    }

    async fn lookup(&self, client: &mut R::Client, id: &str) -> Result<Option<ContainerIdentity>> {
        let task   = client.task(id).await?;
        let labels = client.labels(id).await?;

        if labels.get(KIND_LABEL).map(String::as_str) != Some(KIND_CONTAINER) {
            trace!("skipping container {}: not a workload container", id);
            return Ok(None);
        }

        if task.pid == 0 {
            trace!("skipping container {}: no pid", id);
            return Ok(None);
        }

        if !self.alive(task.pid) {
            trace!("skipping container {}: pid {} is gone", id, task.pid);
            return Ok(None);
        }

        Ok(Some(ContainerIdentity {
            pid:           task.pid,
            pod_name:      label(&labels, POD_NAME_LABEL),
            pod_namespace: label(&labels, POD_NAMESPACE_LABEL),
            container:     label(&labels, CONTAINER_NAME_LABEL),
        }))
    }

    /// A process counts as alive when its `stat` is readable under the
    /// configured proc root and it is not a zombie.
    fn alive(&self, pid: u32) -> bool {
        let root = self.proc_root.join(pid.to_string());
        match Process::new_with_root(root) {
            Ok(process) => process.stat.state != 'Z',
            Err(e)      => {
                trace!("pid {}: {:?}", pid, e);
                false
            }
        }
    }
}

fn label(labels: &Labels, name: &str) -> String {
    labels.get(name).cloned().unwrap_or_default()
}
