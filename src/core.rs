use tokio::sync::mpsc;
use tracing::error;

/// Send a message to the specified Tokio mpsc::UnboundedSender, and if sending
/// fails, log an error with Tracing.
pub fn send_or_error<T>(tx: &mpsc::UnboundedSender<T>, msg: T) {
    tx.send(msg)
        .unwrap_or_else(|_| error!("Error sending message, receiver has been dropped"));
}
