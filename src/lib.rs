//! ragwatch core: deadlock detection over resource allocation graphs
//!
//! Builds a graph of processes and resources, runs either depth-first cycle
//! detection (single-instance resources) or a work/finish safety reduction
//! (multi-instance resources), and returns a verdict together with a
//! structured, replayable trace of every algorithm step. Turning the trace
//! into text, pictures or sound is left to the consumer.
//!
//! ```
//! use ragwatch_core::{detect, DetectorConfig, ResourceAllocationGraph};
//!
//! let mut graph = ResourceAllocationGraph::new();
//! graph.add_process("P1").unwrap();
//! graph.add_process("P2").unwrap();
//! graph.add_single_resource("R1").unwrap();
//! graph.add_single_resource("R2").unwrap();
//! graph.allocate("R1", "P1").unwrap();
//! graph.allocate("R2", "P2").unwrap();
//! graph.request("P1", "R2").unwrap();
//! graph.request("P2", "R1").unwrap();
//!
//! let report = detect(&graph, &DetectorConfig::default()).unwrap();
//! assert!(report.verdict.is_deadlocked());
//! ```

#![allow(clippy::missing_safety_doc)]

pub mod config;
pub mod detection;
pub mod error;
pub mod ffi;
pub mod graph;
pub mod logging;
pub mod shared;
pub mod trace;

pub use config::{DetectionMode, DetectorConfig, TraceConfig};
pub use detection::{detect, detect_with, CycleDetector, DetectionReport, SafetyChecker, Verdict, Witness};
pub use error::{Error, Result};
pub use graph::{EdgeKind, GraphDescription, NodeContext, NodeId, NodeKind, ResourceAllocationGraph};
pub use shared::SharedGraph;
pub use trace::{EventKind, EventTrace, TraceEvent};
