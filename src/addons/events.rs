//! Add-on events delivered to the UI layer.
//!
//! Operations report through an [`EventSink`]. The channel implementation
//! keeps emission order and never blocks the operation.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

/// Event emitted by the addon system.
#[derive(Debug, Clone, PartialEq)]
pub enum AddonEvent {
    /// Progress of an in-flight operation, in `[0.0, 1.0]`.
    Progress { name: String, fraction: f64 },
    /// An install/uninstall finished.
    Finished { name: String, success: bool },
    /// An install/uninstall failed.
    Error { message: String },
    /// A newer version of the tracked addon is available.
    UpdateAvailable { name: String },
}

/// Receiver of addon events.
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, event: AddonEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AddonEvent) {}
}

impl EventSink for UnboundedSender<AddonEvent> {
    fn emit(&self, event: AddonEvent) {
        if self.send(event).is_err() {
            debug!("[ADDON-EVENTS] Event receiver dropped");
        }
    }
}

/// Progress emitter for a single operation.
///
/// Values are clamped to `[0.0, 1.0]` and regressions are dropped, so the
/// emitted sequence is non-decreasing.
pub struct ProgressReporter<'a> {
    name: &'a str,
    sink: &'a dyn EventSink,
    last: Option<f64>,
}

impl<'a> ProgressReporter<'a> {
    /// Creates a reporter for the named addon.
    #[must_use]
    pub fn new(name: &'a str, sink: &'a dyn EventSink) -> Self {
        Self {
            name,
            sink,
            last: None,
        }
    }

    /// Reports a progress fraction.
    pub fn report(&mut self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if self.last.is_some_and(|last| fraction < last) {
            trace!(
                "[ADDON-EVENTS] Dropping regressing progress {} for {}",
                fraction, self.name
            );
            return;
        }

        self.last = Some(fraction);
        self.sink.emit(AddonEvent::Progress {
            name: self.name.to_string(),
            fraction,
        });
    }

    /// Reports a fraction inside `[start, start + span]`.
    pub fn report_scaled(&mut self, start: f64, span: f64, ratio: f64) {
        self.report(start + span * ratio.clamp(0.0, 1.0));
    }

    /// Reports completion.
    pub fn finish(&mut self) {
        self.report(1.0);
    }

    /// Returns the last emitted value.
    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<AddonEvent>>);

    impl EventSink for Recorder {
        fn emit(&self, event: AddonEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl Recorder {
        fn fractions(&self) -> Vec<f64> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    AddonEvent::Progress { fraction, .. } => Some(*fraction),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_reporter_drops_regressions() {
        let recorder = Recorder::default();
        let mut progress = ProgressReporter::new("Foo", &recorder);
        progress.report(0.1);
        progress.report(0.5);
        progress.report(0.3);
        progress.report(2.0);

        assert_eq!(recorder.fractions(), vec![0.1, 0.5, 1.0]);
        assert_eq!(progress.last(), Some(1.0));
    }

    #[test]
    fn test_report_scaled() {
        let recorder = Recorder::default();
        let mut progress = ProgressReporter::new("Foo", &recorder);
        progress.report_scaled(0.15, 0.6, 0.5);
        assert_eq!(recorder.fractions(), vec![0.15 + 0.6 * 0.5]);
    }

    #[test]
    fn test_channel_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.emit(AddonEvent::UpdateAvailable {
            name: "NSQC".to_string(),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            AddonEvent::UpdateAvailable {
                name: "NSQC".to_string()
            }
        );
    }

    proptest! {
        #[test]
        fn prop_emitted_progress_is_monotonic(values in proptest::collection::vec(-1.0f64..2.0, 0..64)) {
            let recorder = Recorder::default();
            let mut progress = ProgressReporter::new("Foo", &recorder);
            for value in &values {
                progress.report(*value);
            }

            let fractions = recorder.fractions();
            prop_assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
            prop_assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
        }
    }
}
