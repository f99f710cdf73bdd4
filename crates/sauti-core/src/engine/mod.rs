//! Single-flight execution engine.
//!
//! The engine owns a FIFO job queue drained by exactly one task. It
//! handles:
//! - Strictly serialized dispatch (global FIFO across all connections)
//! - Cooperative per-job cancellation tokens
//! - Progress and terminal event emission
//! - Partial-failure isolation between jobs

mod cancellation;
mod dispatch;
mod executor;

pub use cancellation::{CancellationRegistry, CancellationToken};
pub use dispatch::{EngineEvent, EngineHandle, ExecutionEngine, SynthesisProgress};
pub use executor::{Executor, ExecutorKind};
