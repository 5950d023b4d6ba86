//! reqscope core - message model, indexing and clock normalization
//!
//! This crate provides the foundational types shared by every reconstruction stage:
//!
//! - **Messages**: the immutable instrumentation messages and their typed payloads
//! - **Index**: per-context lookup of messages by type tag
//! - **Offset**: the server-to-browser clock normalizer
//! - **Diagnostics**: the sink that receives malformed-message reports
//! - **Config**: TOML configuration discovery and validation
//! - **Replay**: loading captured message streams from JSONL files

pub mod category;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod generator;
pub mod index;
pub mod messages;
pub mod offset;
pub mod replay;

// Re-export commonly used types
pub use category::Category;
pub use diagnostics::{CollectingDiagnostics, Diagnostic, DiagnosticsSink, TracingDiagnostics};
pub use error::{LoadError, PayloadError};
pub use index::{MessageIndex, MessageLookup, MessageStore, DEFAULT_CONTEXT};
pub use messages::{Agent, AgentInfo, ContextRef, Message};
pub use offset::{ClockNormalizer, offset_factor};

/// Crate version
pub const REQSCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");
