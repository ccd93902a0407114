use log::trace;
use parking_lot::Mutex;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use crate::data::MetricSeries;
use crate::error::Result;

pub const NAME: &str = "pod_connect_info";
pub const HELP: &str = "Status of pod network connections (established, listening, etc.)";

pub const LABELS: [&str; 7] = [
    "remote_addr",
    "remote_port",
    "status",
    "pod_name",
    "pod_namespace",
    "container",
    "node",
];

pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Holds the last scrape's `pod_connect_info` series. Rendering replaces
/// them wholesale, so concurrent scrapes take turns on the lock.
pub struct Exposition {
    registry: Registry,
    gauge:    GaugeVec,
    lock:     Mutex<()>,
}

impl Exposition {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let gauge    = GaugeVec::new(Opts::new(NAME, HELP), &LABELS)?;
        registry.register(Box::new(gauge.clone()))?;
        let lock = Mutex::new(());
        Ok(Self { registry, gauge, lock })
    }

    pub fn render(&self, series: &[MetricSeries]) -> Result<String> {
        let _guard = self.lock.lock();

        self.gauge.reset();

        for s in series {
            let gauge = self.gauge.get_metric_with_label_values(&s.label_values())?;
            gauge.set(s.value as f64);
        }

        let families = self.registry.gather();

        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;

        trace!("rendered {} series into {} bytes", series.len(), buf.len());

        String::from_utf8(buf).map_err(|e| {
            prometheus::Error::Msg(e.to_string()).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(addr: &str, port: &str, status: &str, value: u64) -> MetricSeries {
        MetricSeries {
            remote_addr:   addr.to_owned(),
            remote_port:   port.to_owned(),
            status:        status.to_owned(),
            pod_name:      "web-0".to_owned(),
            pod_namespace: "default".to_owned(),
            container:     "web".to_owned(),
            node:          "node-1".to_owned(),
            value,
        }
    }

    #[test]
    fn renders_gauge_with_labels() {
        let exposition = Exposition::new().unwrap();
        let text = exposition.render(&[series("1.2.3.4", "443", "ESTABLISHED", 2)]).unwrap();

        assert!(text.contains("# TYPE pod_connect_info gauge"));
        assert!(text.contains(&format!("# HELP pod_connect_info {}", HELP)));
        assert!(text.contains(
            "pod_connect_info{container=\"web\",node=\"node-1\",pod_name=\"web-0\",\
             pod_namespace=\"default\",remote_addr=\"1.2.3.4\",remote_port=\"443\",\
             status=\"ESTABLISHED\"} 2"
        ));
    }

    #[test]
    fn render_replaces_previous_scrape() {
        let exposition = Exposition::new().unwrap();
        exposition.render(&[series("1.2.3.4", "443", "ESTABLISHED", 2)]).unwrap();

        let text = exposition.render(&[series("5.6.7.8", "80", "TIME_WAIT", 1)]).unwrap();

        assert!(!text.contains("1.2.3.4"));
        assert!(text.contains("remote_addr=\"5.6.7.8\""));
    }

    #[test]
    fn empty_scrape_renders_no_samples() {
        let exposition = Exposition::new().unwrap();
        exposition.render(&[series("1.2.3.4", "443", "ESTABLISHED", 2)]).unwrap();

        let text = exposition.render(&[]).unwrap();

        assert!(!text.contains("pod_connect_info{"));
    }
}
