// Event Trace
use super::event::{EventKind, TraceEvent};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only log of one detection run.
///
/// A trace is created by a detector, filled while the run executes and handed
/// to the caller with the verdict. Nothing mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTrace {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    events: Vec<TraceEvent>,
    #[serde(default)]
    truncated: bool,
}

impl EventTrace {
    pub(crate) fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            events: Vec::new(),
            truncated: false,
        }
    }

    pub(crate) fn append(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub(crate) fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&TraceEvent> {
        self.events.last()
    }

    /// True when a capture limit dropped some steps.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Event with the given sequence number, if it was recorded. Events are
    /// kept in strictly increasing `seq` order.
    pub fn get(&self, seq: u64) -> Option<&TraceEvent> {
        self.events
            .binary_search_by_key(&seq, |event| event.seq)
            .ok()
            .map(|pos| &self.events[pos])
    }

    /// Just the event kinds, in order.
    pub fn kinds(&self) -> impl Iterator<Item = &EventKind> + '_ {
        self.events.iter().map(|event| &event.kind)
    }

    /// Step-by-step cursor for replaying the run.
    pub fn replay(&self) -> TraceCursor<'_> {
        TraceCursor {
            events: &self.events,
            position: 0,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a trace, rejecting one whose sequence numbers are out of order.
    pub fn from_json(json: &str) -> Result<Self> {
        let trace: EventTrace = serde_json::from_str(json)?;
        if let Some(pair) = trace.events.windows(2).find(|pair| pair[0].seq >= pair[1].seq) {
            return Err(Error::InvalidData(format!(
                "trace events out of order: seq {} followed by {}",
                pair[0].seq, pair[1].seq
            )));
        }
        Ok(trace)
    }
}

impl<'a> IntoIterator for &'a EventTrace {
    type Item = &'a TraceEvent;
    type IntoIter = std::slice::Iter<'a, TraceEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Forward/backward navigation over recorded events.
///
/// `position` is the index of the next event `step_forward` returns; it
/// ranges from 0 to `len`.
#[derive(Debug, Clone)]
pub struct TraceCursor<'t> {
    events: &'t [TraceEvent],
    position: usize,
}

impl<'t> TraceCursor<'t> {
    pub fn step_forward(&mut self) -> Option<&'t TraceEvent> {
        let event = self.events.get(self.position)?;
        self.position += 1;
        Some(event)
    }

    pub fn step_back(&mut self) -> Option<&'t TraceEvent> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        self.events.get(self.position)
    }

    /// Moves to `position`, clamped to the end of the trace.
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.events.len());
    }

    /// Most recently stepped-over event.
    pub fn current(&self) -> Option<&'t TraceEvent> {
        self.position.checked_sub(1).and_then(|idx| self.events.get(idx))
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position == self.events.len()
    }
}

impl<'t> Iterator for TraceCursor<'t> {
    type Item = &'t TraceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.step_forward()
    }
}
