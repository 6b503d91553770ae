//! Generation-Client: transport layer for Redline
//!
//! This crate talks to the external text-generation service that Redline
//! asks for feedback. It knows the wire shapes and how to frame streamed
//! replies, but nothing about annotations, prompts or rewrites.
//!
//! ## Layer 0 - Transport
//!
//! Focus: one request in, raw reply text out, failures classified.

pub mod config;
pub mod error;
pub mod fakes;
pub mod framing;
pub mod http;
pub mod service;
pub mod wire;

pub use config::{GenerationConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
pub use error::GenerationError;
pub use framing::{frame_ndjson, NdjsonFramer, MAX_LINE_BYTES};
pub use http::HttpGenerationClient;
pub use service::{FrameStream, GenerationReply, GenerationService};
pub use wire::{AtomicReply, GenerationRequest, StreamFragment};

/// Result type for generation-client operations
pub type Result<T> = std::result::Result<T, GenerationError>;
