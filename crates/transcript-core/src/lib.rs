pub mod merge;
pub mod planner;
pub mod render;
pub mod types;

pub use merge::{merge_results, MergeError};
pub use planner::{plan_chunks, PlanError};
pub use render::{OutputFormat, RenderError};
pub use types::{AudioChunk, ChunkProfile, ChunkResult, FileInfo, Segment, Transcript, TranscriptMetadata};
