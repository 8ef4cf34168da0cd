pub mod client;
pub mod server;
pub mod status;

pub use client::{decode_audio_payload, ClientEvent, FrameDecodeError};
pub use server::{FinalMetadata, JobProgressView, ServerEvent, SessionConfig};
pub use status::{JobStatus, SessionStatus};
