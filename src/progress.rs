//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn AdaptProgressCallback>`] via
//! [`crate::config::AdaptConfigBuilder::progress_callback`] to observe each
//! request as it moves through extraction, the model call, sanitisation and
//! packaging. The CLI drives a spinner from it; a server could forward the
//! events to a websocket.
//!
//! # Example
//!
//! ```rust
//! use a11y_adapt::{AdaptConfig, AdaptProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl AdaptProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("→ {}", stage.label());
//!     }
//! }
//!
//! let config = AdaptConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn AdaptProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Generate,
    Sanitize,
    Package,
}

impl Stage {
    /// Short present-participle label for UIs.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Extract => "Extracting content",
            Stage::Generate => "Generating accessible version",
            Stage::Sanitize => "Sanitizing output",
            Stage::Package => "Rendering PDF",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the pipeline as a request moves through its stages.
///
/// Implementations must be `Send + Sync`: batch mode runs several requests
/// concurrently and events from different requests interleave. All methods
/// default to no-ops.
pub trait AdaptProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes without a fatal error.
    ///
    /// `detail` is a short human-readable note such as "1 234 chars".
    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    /// Called once per request with the final outcome.
    fn on_finish(&self, success: bool, message: &str) {
        let _ = (success, message);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AdaptProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AdaptConfig`].
pub type ProgressCallback = Arc<dyn AdaptProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl AdaptProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage:?}"));
        }

        fn on_stage_complete(&self, stage: Stage, _detail: &str) {
            self.events.lock().unwrap().push(format!("done:{stage:?}"));
        }

        fn on_finish(&self, success: bool, _message: &str) {
            self.events.lock().unwrap().push(format!("finish:{success}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Extract);
        cb.on_stage_complete(Stage::Extract, "12 chars");
        cb.on_finish(false, "boom");
    }

    #[test]
    fn recorder_sees_events_in_order() {
        let rec = Recorder::default();
        rec.on_stage_start(Stage::Generate);
        rec.on_stage_complete(Stage::Generate, "");
        rec.on_finish(true, "ok");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start:Generate", "done:Generate", "finish:true"]
        );
    }

    #[test]
    fn stage_labels_are_distinct() {
        let labels = [Stage::Extract, Stage::Generate, Stage::Sanitize, Stage::Package]
            .map(Stage::label);
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
