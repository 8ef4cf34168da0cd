use thiserror::Error;

/// Failure taxonomy at the engine boundary.
///
/// The client itself never retries; it only classifies, so the worker pool
/// can decide whether another attempt is worth its budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
	/// Transient condition: timeout, connect failure, 5xx, 429. Worth
	/// retrying within the caller's budget.
	#[error("retryable engine failure: {0}")]
	Retryable(String),

	/// The engine rejected the request itself (corrupt audio, unsupported
	/// content). Another attempt with the same input cannot succeed.
	#[error("terminal engine failure: {0}")]
	Terminal(String),

	/// The request failed local validation before any I/O happened.
	#[error("invalid engine request: {0}")]
	InvalidRequest(String),
}

impl EngineError {
	#[must_use]
	pub const fn is_retryable(&self) -> bool {
		matches!(self, Self::Retryable(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_retryable_variant_is_retryable() {
		assert!(EngineError::Retryable("timeout".into()).is_retryable());
		assert!(!EngineError::Terminal("bad audio".into()).is_retryable());
		assert!(!EngineError::InvalidRequest("prompt too long".into()).is_retryable());
	}
}
