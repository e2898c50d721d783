//! Dispatch server bootstrap, router wiring and listener lifecycle.

use super::*;

pub fn build_dispatch_router(state: DispatchServerState) -> Router {
    Router::new()
        .route(GET_TASK_ENDPOINT, post(handle_get_task))
        .route(REPORT_STATUS_ENDPOINT, post(handle_report_status))
        .with_state(state)
}

/// Running (or unavailable) HTTP listener for the dispatch endpoints.
pub struct DispatchServerHandle {
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl DispatchServerHandle {
    fn unavailable() -> Self {
        Self {
            local_addr: None,
            shutdown_tx: None,
            task: None,
        }
    }

    /// False when the listener could not be bound and the service runs degraded.
    pub fn is_serving(&self) -> bool {
        self.task.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!("dispatch server task ended abnormally: {error}");
            }
        }
    }
}

/// Binds `host:port` and serves `router` in the background.
///
/// A listener that cannot be bound is logged and reported through
/// [`DispatchServerHandle::is_serving`]; it never fails the caller.
pub async fn start_dispatch_server(host: &str, port: u16, router: Router) -> DispatchServerHandle {
    let listener = match TcpListener::bind((host, port)).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(
                host,
                port,
                "dispatch server failed to start, port may already be in use: {error}"
            );
            return DispatchServerHandle::unavailable();
        }
    };
    let local_addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(error) => {
            tracing::error!("failed to resolve dispatch server address: {error}");
            return DispatchServerHandle::unavailable();
        }
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let serve_result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(error) = serve_result {
            tracing::error!("dispatch server exited unexpectedly: {error}");
        }
    });
    tracing::info!(
        addr = %local_addr,
        get_task = GET_TASK_ENDPOINT,
        report_status = REPORT_STATUS_ENDPOINT,
        "dispatch server listening"
    );

    DispatchServerHandle {
        local_addr: Some(local_addr),
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}
