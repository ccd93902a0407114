use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use crate::collect::ConnectionSource;
use super::prom::{CONTENT_TYPE, Exposition};

pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

pub struct AppState {
    pub source:     Arc<dyn ConnectionSource>,
    pub exposition: Exposition,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(health))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    let (tx, rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router(state)).with_graceful_shutdown(async move {
        rx.await.ok();
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        res = &mut server => return Ok(res??),
        _   = shutdown()  => info!("shutdown requested, draining connections"),
    }

    tx.send(()).ok();

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(res) => res??,
        Err(_)  => warn!("connections still open after {:?}, exiting", SHUTDOWN_GRACE),
    }

    info!("server closed");

    Ok(())
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let series = state.source.collect().await;

    match state.exposition.render(&series) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e)   => {
            error!("rendering metrics failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "health"
}

#[cfg(unix)]
async fn shutdown() {
    use tokio::signal::unix::{SignalKind, signal as unix_signal};

    let mut term = match unix_signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e)   => {
            warn!("cannot listen for SIGTERM: {}", e);
            signal::ctrl_c().await.ok();
            return;
        }
    };

    tokio::select! {
        _ = term.recv()      => info!("SIGTERM received"),
        _ = signal::ctrl_c() => info!("interrupt received"),
    }
}

#[cfg(not(unix))]
async fn shutdown() {
    signal::ctrl_c().await.ok();
    info!("interrupt received");
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use crate::data::MetricSeries;
    use super::*;

    struct Fixed(Vec<MetricSeries>);

    #[async_trait]
    impl ConnectionSource for Fixed {
        async fn collect(&self) -> Vec<MetricSeries> {
            self.0.clone()
        }
    }

    fn state(series: Vec<MetricSeries>) -> Arc<AppState> {
        Arc::new(AppState {
            source:     Arc::new(Fixed(series)),
            exposition: Exposition::new().unwrap(),
        })
    }

    async fn fetch(state: Arc<AppState>, uri: &str) -> (StatusCode, String) {
        let request  = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let status   = response.status();
        let body     = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = fetch(state(Vec::new()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "health");
    }

    #[tokio::test]
    async fn metrics_endpoint() {
        let series = MetricSeries {
            remote_addr:   "0.0.0.0".to_owned(),
            remote_port:   "8080".to_owned(),
            status:        "LISTEN".to_owned(),
            pod_name:      "web-0".to_owned(),
            pod_namespace: "default".to_owned(),
            container:     "web".to_owned(),
            node:          "unknown".to_owned(),
            value:         1,
        };

        let (status, body) = fetch(state(vec![series]), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("status=\"LISTEN\"} 1"));
        assert!(body.contains("remote_port=\"8080\""));
    }

    #[tokio::test]
    async fn empty_metrics_are_still_ok() {
        let (status, body) = fetch(state(Vec::new()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("pod_connect_info{"));
    }

    #[tokio::test]
    async fn unknown_route() {
        let (status, _) = fetch(state(Vec::new()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
