use tokio_util::sync::CancellationToken;

/// Forward operator interrupts (Ctrl+C) to `cancel`.
///
/// The first interrupt cancels the token; loops polling it finish their
/// current unit of work, save what they have and stop. Later interrupts are
/// only logged.
pub fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for interrupt signal");
                return;
            }
            if cancel.is_cancelled() {
                tracing::warn!("shutdown already requested; waiting for the current work to finish");
            } else {
                tracing::warn!("interrupt received; finishing the current work before exiting");
                cancel.cancel();
            }
        }
    });
}
