use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use gumdrop::Options;
use crate::collect::UNKNOWN_NODE;
use crate::runtime::DEFAULT_NAMESPACE;
use crate::runtime::cri::DEFAULT_ENDPOINT;
use crate::table::DEFAULT_ROOT;

pub const PROC_PATH_ENV: &str = "PROC_PATH";
pub const NODE_NAME_ENV: &str = "NODE_NAME";

#[derive(Debug, Options)]
pub struct Args {
    #[options(help = "print help message")]
    pub help: bool,
    #[options(no_short, help = "print version and exit")]
    pub version: bool,
    #[options(default = "28880", help = "exporter listen port")]
    pub port: u16,
    #[options(no_short, default = "/run/containerd/containerd.sock", help = "container runtime socket")]
    pub runtime_endpoint: String,
    #[options(default = "k8s.io", help = "container runtime namespace")]
    pub namespace: String,
    #[options(no_short, help = "proc filesystem root, overrides $PROC_PATH")]
    pub proc_root: Option<String>,
    #[options(count, help = "more logging, repeat for trace")]
    pub verbose: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub listen:    SocketAddr,
    pub endpoint:  PathBuf,
    pub namespace: String,
    pub proc_root: PathBuf,
    pub node:      String,
}

impl Config {
    pub fn new(args: &Args) -> Self {
        Self::with_env(args, |name| env::var(name).ok())
    }

    pub fn with_env<F: Fn(&str) -> Option<String>>(args: &Args, env: F) -> Self {
        let env = |name: &str| env(name).filter(|v| !v.is_empty());

        let proc_root = args.proc_root.clone().or_else(|| env(PROC_PATH_ENV));
        let node      = env(NODE_NAME_ENV).unwrap_or_else(|| UNKNOWN_NODE.to_owned());

        Self {
            listen:    SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port)),
            endpoint:  PathBuf::from(&args.runtime_endpoint),
            namespace: args.namespace.clone(),
            proc_root: PathBuf::from(proc_root.unwrap_or_else(|| DEFAULT_ROOT.to_owned())),
            node,
        }
    }

    pub fn custom_proc_root(&self) -> bool {
        self.proc_root != PathBuf::from(DEFAULT_ROOT)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen:    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 28880)),
            endpoint:  PathBuf::from(DEFAULT_ENDPOINT),
            namespace: DEFAULT_NAMESPACE.to_owned(),
            proc_root: PathBuf::from(DEFAULT_ROOT),
            node:      UNKNOWN_NODE.to_owned(),
        }
    }
}
