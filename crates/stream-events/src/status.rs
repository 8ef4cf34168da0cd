use serde::{Deserialize, Serialize};

/// Lifecycle of a file job. `Completed`, `Failed` and `Cancelled` are
/// terminal: no further transitions, and the matching progress event is the
/// last one emitted for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
	Queued,
	Processing,
	Completed,
	Failed,
	Cancelled,
}

impl JobStatus {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
	}
}

/// Lifecycle of a live streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
	Created,
	Active,
	Stopped,
	TimedOut,
}

impl SessionStatus {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Stopped | Self::TimedOut)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_states_are_exactly_three() {
		assert!(!JobStatus::Queued.is_terminal());
		assert!(!JobStatus::Processing.is_terminal());
		assert!(JobStatus::Completed.is_terminal());
		assert!(JobStatus::Failed.is_terminal());
		assert!(JobStatus::Cancelled.is_terminal());
	}

	#[test]
	fn statuses_serialize_camel_case() {
		assert_eq!(serde_json::to_string(&JobStatus::Queued).unwrap(), "\"queued\"");
		assert_eq!(serde_json::to_string(&SessionStatus::TimedOut).unwrap(), "\"timedOut\"");
	}
}
