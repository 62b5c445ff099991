//! Dependency resolution and critical-path analysis.

mod critical_path;
mod graph;

pub use critical_path::{CriticalPathAnalyzer, CriticalPathReport, TaskTiming};
pub use graph::{CycleReport, DependencyGraph};
