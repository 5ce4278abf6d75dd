//! Notifier that writes alerts to the log.

use tracing::info;

use crate::ports::notify_port::NotifyPort;

/// Emits each notification as an `info` event on the `notify` target.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotifyPort for LogNotifier {
    fn notify(&self, text: &str) {
        for line in text.lines() {
            info!(target: "notify", "{line}");
        }
    }
}
