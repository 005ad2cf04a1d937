// Run-scoped trace recorder
use super::event::{EventKind, TraceEvent};
use super::log::EventTrace;
use crate::config::TraceConfig;
use tracing::{trace, warn};

/// Numbers steps and applies the capture policy while a detector runs.
pub(crate) struct TraceRecorder<'c> {
    config: &'c TraceConfig,
    trace: EventTrace,
    next_seq: u64,
}

impl<'c> TraceRecorder<'c> {
    pub(crate) fn new(config: &'c TraceConfig) -> Self {
        Self {
            config,
            trace: EventTrace::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn emit(&mut self, depth: usize, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        trace!(seq, depth, event = kind.name(), "detector step");

        // Terminal events bypass every limit
        if !kind.is_terminal() {
            if !self.config.capture {
                return;
            }
            if let Some(max) = self.config.max_events {
                // Keep one slot for the terminal event
                if self.trace.len() + 1 >= max {
                    if !self.trace.is_truncated() {
                        warn!(max_events = max, "trace capture limit reached");
                        self.trace.mark_truncated();
                    }
                    return;
                }
            }
        }

        self.trace.append(TraceEvent { seq, depth, kind });
    }

    /// Number of steps emitted so far, recorded or not.
    pub(crate) fn steps(&self) -> u64 {
        self.next_seq
    }

    pub(crate) fn finish(self) -> EventTrace {
        self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;

    fn backtrack(id: &str) -> EventKind {
        EventKind::Backtrack { node: NodeId::from(id) }
    }

    #[test]
    fn test_limit_keeps_terminal_event() {
        let config = TraceConfig {
            capture: true,
            max_events: Some(3),
        };
        let mut recorder = TraceRecorder::new(&config);
        for id in ["P1", "P2", "P3", "P4"] {
            recorder.emit(1, backtrack(id));
        }
        recorder.emit(0, EventKind::NoCycle);
        assert_eq!(recorder.steps(), 5);

        let trace = recorder.finish();
        assert!(trace.is_truncated());
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.last().unwrap().seq, 4);
        assert!(trace.last().unwrap().kind.is_terminal());
    }

    #[test]
    fn test_verdict_only_capture() {
        let config = TraceConfig::verdict_only();
        let mut recorder = TraceRecorder::new(&config);
        recorder.emit(0, backtrack("P1"));
        recorder.emit(0, EventKind::NoCycle);

        let trace = recorder.finish();
        assert_eq!(trace.len(), 1);
        assert!(!trace.is_truncated());
        assert_eq!(trace.events()[0].seq, 1);
    }
}
