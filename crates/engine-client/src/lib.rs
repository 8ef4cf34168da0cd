mod client;
mod error;
mod types;

pub use client::{HttpEngineClient, Transcriber};
pub use error::EngineError;
pub use types::{EngineRequest, EngineResponse, EngineResponseMetadata, EngineSegment, MAX_PROMPT_CHARS};
