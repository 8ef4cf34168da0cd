use clap::Parser;
use job_engine::SchedulerConfig;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "transcribe_host")]
#[command(about = "Long-form audio transcription orchestration server", long_about = None)]
pub struct Config {
	/// Listen address
	#[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
	pub bind_addr: String,

	/// Transcription engine base URL
	#[arg(long, env = "ENGINE_URL", default_value = "http://localhost:9000")]
	pub engine_url: String,

	/// Max request body size in MB (bounds uploads)
	#[arg(long, env = "MAX_REQUEST_SIZE", default_value = "512")]
	pub max_request_size: usize,

	/// Max simultaneously processed HTTP requests
	#[arg(long, env = "MAX_CONCURRENT_REQ", default_value = "64")]
	pub max_concurrent_req: usize,

	/// Per-request timeout in milliseconds
	#[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
	pub request_timeout_ms: u64,

	/// Streaming session inactivity timeout in seconds
	#[arg(long, env = "SESSION_IDLE_SECS", default_value = "30")]
	pub session_idle_secs: u64,

	/// Seconds of buffered session audio before an incremental engine call
	#[arg(long, env = "SESSION_WINDOW_SECS", default_value = "5")]
	pub session_window_secs: f64,

	/// Event bus capacity (events buffered per slow subscriber)
	#[arg(long, env = "EVENTS_CAPACITY", default_value = "1024")]
	pub events_capacity: usize,

	/// Log filter, e.g. "transcribe_host=debug,info"
	#[arg(long, env = "RUST_LOG")]
	pub rust_log: Option<String>,

	/// Emit JSON logs instead of pretty ones
	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,

	#[command(flatten)]
	pub scheduler: SchedulerConfig,
}

impl Config {
	pub fn validate(&self) -> Result<(), String> {
		if self.max_request_size == 0 {
			return Err("max_request_size must be greater than 0".to_string());
		}
		if self.session_idle_secs == 0 {
			return Err("session_idle_secs must be greater than 0".to_string());
		}
		if self.session_window_secs <= 0.0 {
			return Err("session_window_secs must be positive".to_string());
		}
		self.scheduler.validate()
	}

	#[must_use]
	pub const fn session_idle_timeout(&self) -> Duration {
		Duration::from_secs(self.session_idle_secs)
	}

	#[must_use]
	pub const fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_parse_and_validate() {
		let config = Config::try_parse_from(["transcribe_host"]).unwrap();
		assert_eq!(config.bind_addr, "0.0.0.0:3000");
		assert_eq!(config.scheduler.max_concurrent_chunks, 3);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn scheduler_flags_flatten_into_the_cli() {
		let config = Config::try_parse_from(["transcribe_host", "--max-concurrent-chunks", "5", "--global-max-chunks", "12"]).unwrap();
		assert_eq!(config.scheduler.max_concurrent_chunks, 5);
		assert_eq!(config.scheduler.global_max_chunks, 12);
	}

	#[test]
	fn zero_idle_timeout_is_rejected() {
		let config = Config::try_parse_from(["transcribe_host", "--session-idle-secs", "0"]).unwrap();
		assert!(config.validate().is_err());
	}
}
