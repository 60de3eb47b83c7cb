//! Progress events flowing from the generator back to the session.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const ERROR_MARKER: &str = "Error!";
pub const SUCCESS_MARKER: &str = "Done!";
pub const UNCHANGED_PERCENT: f64 = -1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub progress: f64,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Success,
    Failure,
}

impl ProgressEvent {
    pub fn new(progress: f64, message: impl Into<String>) -> Self {
        Self {
            progress,
            message: message.into(),
        }
    }

    pub fn message_only(message: impl Into<String>) -> Self {
        Self::new(UNCHANGED_PERCENT, message)
    }

    /// Negative progress leaves the displayed percent alone.
    pub fn percent(&self) -> Option<f64> {
        (self.progress >= 0.0).then_some(self.progress)
    }

    pub fn text(&self) -> Option<&str> {
        (!self.message.is_empty()).then_some(self.message.as_str())
    }

    pub fn terminal(&self) -> Option<Terminal> {
        if self.message.starts_with(ERROR_MARKER) {
            Some(Terminal::Failure)
        } else if self.message.starts_with(SUCCESS_MARKER) {
            Some(Terminal::Success)
        } else {
            None
        }
    }
}

/// Sending half of the progress stream, cloned into whatever runs the job.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    /// `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, progress: f64, message: impl Into<String>) {
        // No subscribers just means nobody is watching yet.
        let _ = self.tx.send(ProgressEvent::new(progress, message));
    }

    pub fn emit_message(&self, message: impl Into<String>) {
        self.emit(UNCHANGED_PERCENT, message);
    }

    pub fn emit_error(&self, message: &str) {
        self.emit(UNCHANGED_PERCENT, format!("{ERROR_MARKER} {message}"));
    }

    pub fn emit_done(&self, message: &str) {
        self.emit(100.0, format!("{SUCCESS_MARKER} {message}"));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_mean_unchanged() {
        let event = ProgressEvent::new(-1.0, "");
        assert_eq!(event.percent(), None);
        assert_eq!(event.text(), None);
        assert_eq!(event.terminal(), None);

        let event = ProgressEvent::new(42.5, "Fetching data...");
        assert_eq!(event.percent(), Some(42.5));
        assert_eq!(event.text(), Some("Fetching data..."));
    }

    #[test]
    fn markers_are_prefix_matched() {
        assert_eq!(
            ProgressEvent::message_only("Error! no data").terminal(),
            Some(Terminal::Failure)
        );
        assert_eq!(
            ProgressEvent::new(100.0, "Done! World generation completed.").terminal(),
            Some(Terminal::Success)
        );
        assert_eq!(
            ProgressEvent::message_only("Saving: Done! soon").terminal(),
            None
        );
    }

    #[tokio::test]
    async fn reporter_formats_terminal_messages() {
        let reporter = ProgressReporter::new(8);
        let mut rx = reporter.subscribe();
        reporter.emit_error("timed out");
        reporter.emit_done("World generation completed.");

        let first = rx.recv().await.unwrap();
        assert_eq!(first, ProgressEvent::new(-1.0, "Error! timed out"));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.progress, 100.0);
        assert_eq!(second.message, "Done! World generation completed.");
    }

    #[test]
    fn event_wire_format() {
        let event: ProgressEvent = serde_json::from_str(r#"{"progress":-1}"#).unwrap();
        assert_eq!(event, ProgressEvent::new(-1.0, ""));
    }

    #[test]
    fn zero_capacity_still_delivers() {
        let reporter = ProgressReporter::new(0);
        let mut rx = reporter.subscribe();
        reporter.emit_message("Fetching data...");
        assert_eq!(
            rx.try_recv().unwrap(),
            ProgressEvent::message_only("Fetching data...")
        );
    }
}
