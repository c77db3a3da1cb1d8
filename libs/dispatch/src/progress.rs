//! Out-of-band progress notifications
//!
//! Handlers and the dispatcher report progress as `in_progress` results. The
//! reporter fans them out to whatever sinks were attached: the transport
//! attaches itself so progress reaches the controller, tests attach a channel.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;
use types::CommandResult;

/// Observer receiving every published result
pub trait ResultSink: Send + Sync {
    fn publish(&self, result: &CommandResult);
}

/// Forward into an unbounded channel; a closed receiver drops the result
impl ResultSink for mpsc::UnboundedSender<CommandResult> {
    fn publish(&self, result: &CommandResult) {
        if self.send(result.clone()).is_err() {
            trace!("Progress receiver closed, dropping result");
        }
    }
}

/// Cloneable handle fanning progress out to the attached sinks
#[derive(Clone, Default)]
pub struct ProgressReporter {
    sinks: Arc<RwLock<Vec<Arc<dyn ResultSink>>>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter with one channel sink attached, and the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CommandResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Self::new();
        reporter.attach(Arc::new(tx));
        (reporter, rx)
    }

    pub fn attach(&self, sink: Arc<dyn ResultSink>) {
        self.sinks.write().push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Publish a log line as an `in_progress` result
    pub fn report(&self, logged_message: impl Into<String>) {
        self.publish(&CommandResult::in_progress(logged_message));
    }

    pub fn publish(&self, result: &CommandResult) {
        for sink in self.sinks.read().iter() {
            sink.publish(result);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("sinks", &self.sink_count())
            .finish()
    }
}
