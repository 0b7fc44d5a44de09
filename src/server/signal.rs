// Signal handling module
//
// Supported signals:
// - SIGTERM: graceful shutdown (sent by container runtimes on pod stop)
// - SIGINT:  graceful shutdown (Ctrl+C)

/// Resolve once the process is asked to stop, yielding the signal name
///
/// If a handler cannot be registered the failure is logged and that signal
/// is simply never observed.
#[cfg(unix)]
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            crate::logger::log_warning(&format!("Failed to register SIGTERM handler: {e}"));
            None
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => Some(s),
        Err(e) => {
            crate::logger::log_warning(&format!("Failed to register SIGINT handler: {e}"));
            None
        }
    };

    tokio::select! {
        Some(()) = recv(sigterm.as_mut()) => "SIGTERM received",
        Some(()) = recv(sigint.as_mut()) => "SIGINT received",
        else => std::future::pending().await,
    }
}

#[cfg(unix)]
async fn recv(signal: Option<&mut tokio::signal::unix::Signal>) -> Option<()> {
    match signal {
        Some(s) => s.recv().await,
        None => None,
    }
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl+C received",
        Err(e) => {
            crate::logger::log_warning(&format!("Failed to listen for Ctrl+C: {e}"));
            std::future::pending().await
        }
    }
}
