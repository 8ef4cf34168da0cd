use crate::files::FileStore;
use crate::registry::JobRegistry;
use chrono::Utc;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One reclaimable artifact on disk.
#[derive(Debug, Clone)]
pub struct CleanupRecord {
	pub path: PathBuf,
	pub owner: Option<Uuid>,
	pub created_at: Instant,
	pub protected: bool,
}

/// Table of temp artifacts (chunk cuts, session spill) keyed by path.
///
/// Ownership and the protected flag are the only write paths; the sweeper
/// never mutates entries, it only reads a snapshot and deletes.
#[derive(Default)]
pub struct CleanupTracker {
	records: DashMap<PathBuf, CleanupRecord>,
}

impl CleanupTracker {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, path: PathBuf, owner: Option<Uuid>) {
		self.records.insert(
			path.clone(),
			CleanupRecord {
				path,
				owner,
				created_at: Instant::now(),
				protected: false,
			},
		);
	}

	/// Pin a path regardless of owner state (used by live sessions, which
	/// the job registry knows nothing about).
	pub fn register_protected(&self, path: PathBuf, owner: Option<Uuid>) {
		self.records.insert(
			path.clone(),
			CleanupRecord {
				path,
				owner,
				created_at: Instant::now(),
				protected: true,
			},
		);
	}

	pub fn unprotect(&self, path: &Path) {
		if let Some(mut record) = self.records.get_mut(path) {
			record.protected = false;
		}
	}

	pub fn forget(&self, path: &Path) -> Option<CleanupRecord> {
		self.records.remove(path).map(|(_, r)| r)
	}

	#[must_use]
	pub fn snapshot(&self) -> Vec<CleanupRecord> {
		self.records.iter().map(|entry| entry.clone()).collect()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.records.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

/// Free-bytes probe, injectable so sweeps are testable without a full
/// disk.
pub type DiskProbe = Arc<dyn Fn(&Path) -> u64 + Send + Sync>;

/// Probe backed by the mounted filesystems; picks the longest mount-point
/// prefix of the temp root.
#[must_use]
pub fn system_disk_probe() -> DiskProbe {
	Arc::new(|path: &Path| {
		let disks = sysinfo::Disks::new_with_refreshed_list();
		disks
			.list()
			.iter()
			.filter(|disk| path.starts_with(disk.mount_point()))
			.max_by_key(|disk| disk.mount_point().as_os_str().len())
			.map_or(u64::MAX, sysinfo::Disk::available_space)
	})
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
	pub artifacts_removed: usize,
	pub files_removed: usize,
	pub emergency: bool,
}

/// Background reclaimer for temp artifacts and retired uploads.
///
/// The protected set is recomputed from a registry snapshot on every
/// sweep; jobs never reach into this table directly.
pub struct CleanupService {
	tracker: CleanupTracker,
	registry: Arc<JobRegistry>,
	files: Arc<FileStore>,
	grace: Duration,
	interval: Duration,
	min_free_bytes: u64,
	probe: DiskProbe,
	pressure: AtomicBool,
}

impl CleanupService {
	#[must_use]
	pub fn new(registry: Arc<JobRegistry>, files: Arc<FileStore>, grace: Duration, interval: Duration, min_free_bytes: u64, probe: DiskProbe) -> Self {
		Self {
			tracker: CleanupTracker::new(),
			registry,
			files,
			grace,
			interval,
			min_free_bytes,
			probe,
			pressure: AtomicBool::new(false),
		}
	}

	#[must_use]
	pub fn tracker(&self) -> &CleanupTracker {
		&self.tracker
	}

	/// Whether admission should currently be refused.
	#[must_use]
	pub fn disk_pressure(&self) -> bool {
		self.pressure.load(Ordering::Relaxed)
	}

	/// Re-probe free space and update the admission flag.
	pub fn refresh_pressure(&self) -> u64 {
		let free = (self.probe)(self.files.root());
		let under = free < self.min_free_bytes;
		let was = self.pressure.swap(under, Ordering::Relaxed);
		if under && !was {
			warn!(free_bytes = free, floor = self.min_free_bytes, "Disk pressure: suspending job admission, bypassing grace periods");
		} else if !under && was {
			info!(free_bytes = free, "Disk pressure cleared: admission resumed");
		}
		free
	}

	#[must_use]
	pub const fn min_free_bytes(&self) -> u64 {
		self.min_free_bytes
	}

	/// One pass over artifacts and uploads. Protected paths and paths
	/// owned by a non-terminal job are untouchable no matter what; the
	/// grace period only applies outside emergency mode.
	pub fn sweep(&self) -> SweepStats {
		let emergency = self.disk_pressure();
		let mut stats = SweepStats {
			emergency,
			..SweepStats::default()
		};

		for record in self.tracker.snapshot() {
			if record.protected {
				continue;
			}
			if let Some(owner) = record.owner {
				let owner_active = self.registry.job_status(owner).map(|s| !s.is_terminal()).unwrap_or(false);
				if owner_active {
					continue;
				}
			}
			if !emergency && record.created_at.elapsed() < self.grace {
				continue;
			}

			if let Err(e) = std::fs::remove_file(&record.path) {
				if e.kind() != std::io::ErrorKind::NotFound {
					warn!(path = %record.path.display(), error = %e, "Failed to delete artifact");
					continue;
				}
			}
			self.tracker.forget(&record.path);
			stats.artifacts_removed += 1;
			debug!(path = %record.path.display(), emergency, "Reclaimed artifact");
		}

		let referenced = self.registry.active_file_ids();
		for info in self.files.entries() {
			if referenced.contains(&info.id) {
				continue;
			}
			let age = (Utc::now() - info.created_at).to_std().unwrap_or_default();
			if !emergency && age < self.grace {
				continue;
			}
			self.files.remove(info.id);
			stats.files_removed += 1;
			debug!(file_id = %info.id, emergency, "Reclaimed uploaded file");
		}

		if stats.artifacts_removed + stats.files_removed > 0 {
			info!(artifacts = stats.artifacts_removed, files = stats.files_removed, emergency, "Cleanup sweep finished");
		}
		stats
	}

	/// Synchronous reclaim of one owner's artifacts, invoked the moment a
	/// job or session goes terminal. The grace period does not apply: the
	/// owner is done with them by definition.
	pub fn sweep_owner(&self, owner: Uuid) -> usize {
		let mut removed = 0;
		for record in self.tracker.snapshot() {
			if record.owner != Some(owner) || record.protected {
				continue;
			}
			if let Err(e) = std::fs::remove_file(&record.path) {
				if e.kind() != std::io::ErrorKind::NotFound {
					warn!(path = %record.path.display(), error = %e, "Failed to delete artifact");
					continue;
				}
			}
			self.tracker.forget(&record.path);
			removed += 1;
		}
		if removed > 0 {
			debug!(%owner, removed, "Reclaimed terminal owner's artifacts");
		}
		removed
	}

	/// Periodic sweeper task; runs until cancelled.
	pub async fn run(self: Arc<Self>, token: CancellationToken) {
		let mut ticker = tokio::time::interval(self.interval);
		info!(interval_secs = self.interval.as_secs(), grace_secs = self.grace.as_secs(), "Cleanup sweeper started");

		loop {
			tokio::select! {
				() = token.cancelled() => {
					info!("Cleanup sweeper stopping");
					break;
				}
				_ = ticker.tick() => {
					self.refresh_pressure();
					self.sweep();
				}
			}
		}
	}
}
