use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct SchedulerConfig {
	/// Maximum chunks in flight for a single job
	#[arg(long, env = "MAX_CONCURRENT_CHUNKS", default_value = "3")]
	pub max_concurrent_chunks: usize,

	/// Ceiling on chunks in flight across ALL jobs
	#[arg(long, env = "GLOBAL_MAX_CHUNKS", default_value = "8")]
	pub global_max_chunks: usize,

	/// Retries granted to a chunk after its first attempt
	#[arg(long, env = "CHUNK_RETRY_BUDGET", default_value = "2")]
	pub chunk_retry_budget: u32,

	/// Base delay for exponential retry backoff, in milliseconds
	#[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "500")]
	pub retry_base_delay_ms: u64,

	/// Per-chunk engine call timeout, in seconds
	#[arg(long, env = "CHUNK_TIMEOUT_SECS", default_value = "120")]
	pub chunk_timeout_secs: u64,

	/// Seconds of audio shared between adjacent chunks
	#[arg(long, env = "CHUNK_OVERLAP_SECS", default_value = "10")]
	pub overlap_secs: f64,

	/// Cleanup sweep cadence, in seconds
	#[arg(long, env = "CLEANUP_INTERVAL_SECS", default_value = "60")]
	pub cleanup_interval_secs: u64,

	/// Age an unprotected artifact must reach before normal deletion, in seconds
	#[arg(long, env = "CLEANUP_GRACE_SECS", default_value = "300")]
	pub cleanup_grace_secs: u64,

	/// Free-space floor; below this, grace periods are bypassed and new
	/// jobs are rejected
	#[arg(long, env = "MIN_FREE_DISK_BYTES", default_value = "536870912")]
	pub min_free_disk_bytes: u64,

	/// Upper bound on files per batch submission
	#[arg(long, env = "MAX_BATCH_FILES", default_value = "50")]
	pub max_batch_files: usize,

	/// Upper bound on a single uploaded file, in bytes (500 MB)
	#[arg(long, env = "MAX_FILE_BYTES", default_value = "524288000")]
	pub max_file_bytes: u64,

	/// Directory for uploaded audio and chunk artifacts
	#[arg(long, env = "TEMP_DIR", default_value = "/tmp/transcribe-host")]
	pub temp_dir: PathBuf,
}

impl SchedulerConfig {
	pub fn validate(&self) -> Result<(), String> {
		if self.max_concurrent_chunks == 0 {
			return Err("max_concurrent_chunks must be at least 1".to_string());
		}
		if self.global_max_chunks < self.max_concurrent_chunks {
			return Err("global_max_chunks must be >= max_concurrent_chunks".to_string());
		}
		if self.overlap_secs < 0.0 {
			return Err("overlap_secs must be non-negative".to_string());
		}
		if self.chunk_timeout_secs == 0 {
			return Err("chunk_timeout_secs must be greater than 0".to_string());
		}
		if self.max_batch_files == 0 || self.max_batch_files > 50 {
			return Err("max_batch_files must be in 1..=50".to_string());
		}
		Ok(())
	}

	#[must_use]
	pub const fn retry_base_delay(&self) -> Duration {
		Duration::from_millis(self.retry_base_delay_ms)
	}

	#[must_use]
	pub const fn chunk_timeout(&self) -> Duration {
		Duration::from_secs(self.chunk_timeout_secs)
	}

	#[must_use]
	pub const fn cleanup_grace(&self) -> Duration {
		Duration::from_secs(self.cleanup_grace_secs)
	}

	/// Preset with tight timings, no grace period and no disk floor, for
	/// exercising the scheduler in tests.
	#[must_use]
	pub fn test(temp_dir: PathBuf) -> Self {
		Self {
			max_concurrent_chunks: 3,
			global_max_chunks: 8,
			chunk_retry_budget: 2,
			retry_base_delay_ms: 5,
			chunk_timeout_secs: 5,
			overlap_secs: 10.0,
			cleanup_interval_secs: 1,
			cleanup_grace_secs: 0,
			min_free_disk_bytes: 0,
			max_batch_files: 50,
			max_file_bytes: 524_288_000,
			temp_dir,
		}
	}
}
