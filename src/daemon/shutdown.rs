use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancelation` on ctrl-c or, on unix, SIGTERM (what `pacering stop` sends). Returns
/// early when the token is cancelled by someone else.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c");
            cancelation.cancel();
        },
        _ = terminate() => {
            info!("Received terminate signal");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {},
    };
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("Can't listen for SIGTERM {e:?}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
