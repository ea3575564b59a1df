use meshcall_core::ClientMessage;
use tokio::sync::mpsc;
use tracing::warn;

/// Outgoing side of the signaling connection.
pub trait SignalSink: Send + Sync {
    fn send(&self, msg: ClientMessage);
}

impl SignalSink for mpsc::UnboundedSender<ClientMessage> {
    fn send(&self, msg: ClientMessage) {
        if let Err(e) = mpsc::UnboundedSender::send(self, msg) {
            warn!("Signaling connection is closed, dropping {:?}", e.0);
        }
    }
}
