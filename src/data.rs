use std::fmt;
use std::net::Ipv4Addr;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerIdentity {
    pub pid:           u32,
    pub pod_name:      String,
    pub pod_namespace: String,
    pub container:     String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Protocol {
    Tcp,
}

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Addr {
    V4(Ipv4Addr),
    Unknown,
}

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum State {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionRecord {
    pub protocol:    Protocol,
    pub local_addr:  Addr,
    pub local_port:  u16,
    pub remote_addr: Addr,
    pub remote_port: u16,
    pub state:       State,
}

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ConnectionKey {
    pub remote_addr: Addr,
    pub remote_port: u16,
    pub state:       State,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionAggregate {
    pub remote_addr: Addr,
    pub remote_port: u16,
    pub state:       State,
    pub count:       u64,
}

/// One `pod_connect_info` observation. Label values are already rendered
/// so the exposition layer never has to know about the pipeline types.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetricSeries {
    pub remote_addr:   String,
    pub remote_port:   String,
    pub status:        String,
    pub pod_name:      String,
    pub pod_namespace: String,
    pub container:     String,
    pub node:          String,
    pub value:         u64,
}

const LOOPBACK: Addr = Addr::V4(Ipv4Addr::LOCALHOST);

impl Addr {
    pub fn is_loopback(&self) -> bool {
        *self == LOOPBACK
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(ip)  => write!(f, "{}", ip),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

const STATES: &[(&str, State)] = &[
    ("01", State::Established),
    ("02", State::SynSent),
    ("03", State::SynRecv),
    ("04", State::FinWait1),
    ("05", State::FinWait2),
    ("06", State::TimeWait),
    ("07", State::Close),
    ("08", State::CloseWait),
    ("09", State::LastAck),
    ("0A", State::Listen),
    ("0B", State::Closing),
];

impl State {
    /// Maps the two digit hex code of the kernel's `st` column.
    pub fn from_code(code: &str) -> Self {
        STATES.iter().find(|(c, _)| *c == code).map_or(Self::Unknown, |(_, s)| *s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Established => "ESTABLISHED",
            Self::SynSent     => "SYN_SENT",
            Self::SynRecv     => "SYN_RECV",
            Self::FinWait1    => "FIN_WAIT1",
            Self::FinWait2    => "FIN_WAIT2",
            Self::TimeWait    => "TIME_WAIT",
            Self::Close       => "CLOSE",
            Self::CloseWait   => "CLOSE_WAIT",
            Self::LastAck     => "LAST_ACK",
            Self::Listen      => "LISTEN",
            Self::Closing     => "CLOSING",
            Self::Unknown     => "UNKNOWN",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConnectionRecord {
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            remote_addr: self.remote_addr,
            remote_port: self.remote_port,
            state:       self.state,
        }
    }
}

impl MetricSeries {
    pub fn new(agg: &ConnectionAggregate, id: &ContainerIdentity, node: &str) -> Self {
        Self {
            remote_addr:   agg.remote_addr.to_string(),
            remote_port:   agg.remote_port.to_string(),
            status:        agg.state.to_string(),
            pod_name:      id.pod_name.clone(),
            pod_namespace: id.pod_namespace.clone(),
            container:     id.container.clone(),
            node:          node.to_owned(),
            value:         agg.count,
        }
    }

    /// Label values in the order of [`crate::expose::prom::LABELS`].
    pub fn label_values(&self) -> [&str; 7] {
        [
            self.remote_addr.as_str(),
            self.remote_port.as_str(),
            self.status.as_str(),
            self.pod_name.as_str(),
            self.pod_namespace.as_str(),
            self.container.as_str(),
            self.node.as_str(),
        ]
    }
}
