use std::time::Instant;
use async_trait::async_trait;
use log::{debug, warn};
use tokio::task;
use crate::aggregate::aggregate;
use crate::data::MetricSeries;
use crate::resolve::Resolver;
use crate::runtime::Runtime;
use crate::table::TableReader;

pub const UNKNOWN_NODE: &str = "unknown";

/// A pull source of metric series, recomputed from scratch on each call.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn collect(&self) -> Vec<MetricSeries>;
}

pub struct Collector<R> {
    resolver: Resolver<R>,
    reader:   TableReader,
    node:     String,
}

impl<R: Runtime> Collector<R> {
    pub fn new(resolver: Resolver<R>, reader: TableReader, node: impl Into<String>) -> Self {
        Self {
            resolver,
            reader,
            node:     node.into(),
        }
    }
}

#[async_trait]
impl<R: Runtime> ConnectionSource for Collector<R> {
    async fn collect(&self) -> Vec<MetricSeries> {
        let start = Instant::now();

        let containers = match self.resolver.resolve().await {
            Ok(containers) => containers,
            Err(e)         => {
                warn!("listing containers failed: {}", e);
                return Vec::new();
            }
        };

        let mut series = Vec::new();

        for c in &containers {
            let reader = self.reader.clone();
            let pid    = c.pid;

            let stats = task::spawn_blocking(move || {
                reader.read(pid).map(|records| aggregate(&records))
            }).await;

            let stats = match stats {
                Ok(Ok(stats)) => stats,
                Ok(Err(e))    => {
                    warn!("skipping {}/{}/{} (pid {}): {}",
                          c.pod_namespace, c.pod_name, c.container, c.pid, e);
                    continue;
                }
                Err(e)        => {
                    warn!("reading pid {} failed: {}", c.pid, e);
                    continue;
                }
            };

            series.extend(stats.iter().map(|s| MetricSeries::new(s, c, &self.node)));
        }

        debug!("collected {} series from {} containers in {:?}",
               series.len(), containers.len(), start.elapsed());

        series
    }
}
