//! Sauti Core - Serialized speech job engine
//!
//! This crate provides the core of the Sauti speech job server:
//! the wire protocol contracts, the single-flight execution engine with
//! cooperative cancellation, and the collaborator contracts the engine
//! calls into (speech backend, package resolver, audio transcoder).
//!
//! # Architecture
//!
//! - All jobs from all connections are funneled into one FIFO queue
//!   drained by a single engine task; no two jobs ever run concurrently.
//! - Cancellation is cooperative: handlers poll a per-job token at their
//!   own safe points, the engine never preempts a running computation.
//! - The engine can run in-process or on a dedicated single-threaded
//!   runtime, reachable only through its job and event channels.
//!
//! # Example
//!
//! ```ignore
//! use sauti_core::engine::{Executor, ExecutorKind};
//!
//! let (handle, events) = Executor::spawn(backend, ExecutorKind::Dedicated);
//! handle.submit(envelope)?;
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod packages;
pub mod protocol;
pub mod transcode;

pub use backend::SpeechBackend;
pub use config::ServerConfig;
pub use engine::{
    CancellationRegistry, CancellationToken, EngineEvent, EngineHandle, ExecutionEngine, Executor,
    ExecutorKind, SynthesisProgress,
};
pub use error::{Error, Result};
pub use packages::PackageResolver;
pub use protocol::{RequestBody, RequestEnvelope, ResponseBody, ResponseEnvelope};
pub use transcode::{FfmpegTranscoder, TranscodeOptions};
