use std::sync::Arc;
use anyhow::Result;
use env_logger::Builder;
use gumdrop::Options;
use log::{info, LevelFilter};
use podconn::collect::Collector;
use podconn::config::{Args, Config};
use podconn::expose::{AppState, Exposition};
use podconn::resolve::Resolver;
use podconn::runtime::CriRuntime;
use podconn::table::TableReader;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args_default_or_exit();

    if args.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut builder = Builder::from_default_env();
    builder.filter(None, match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });
    builder.init();

    let config = Config::new(&args);

    if config.custom_proc_root() {
        info!("using proc root {}", config.proc_root.display());
    }

    info!("starting {} v{} on node {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), config.node);

    let runtime   = CriRuntime::new(&config.endpoint);
    let resolver  = Resolver::new(runtime, &config.namespace, &config.proc_root);
    let reader    = TableReader::new(&config.proc_root);
    let collector = Collector::new(resolver, reader, &config.node);

    let state = Arc::new(AppState {
        source:     Arc::new(collector),
        exposition: Exposition::new()?,
    });

    podconn::expose::serve(config.listen, state).await
}
