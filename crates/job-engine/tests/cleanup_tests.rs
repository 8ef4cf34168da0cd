mod support;

use job_engine::JobOptions;
use std::sync::Arc;
use std::time::Duration;
use stream_events::JobStatus;
use support::{build_harness, build_harness_with, upload, wait_until, MockEngine};
use transcript_core::ChunkProfile;

// ============================================================================
// PROTECTION INVARIANTS
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn sweep_never_touches_files_of_running_jobs() {
	// grace is zero in the test preset, so only the active-job check
	// stands between the sweep and the upload
	let harness = build_harness(MockEngine::with_delay(200, 300));
	let file_id = upload(&harness, 600).await;
	let path = harness.files.get(file_id).unwrap().path;

	let job_id = harness
		.scheduler
		.submit_file(
			file_id,
			JobOptions {
				profile: ChunkProfile::Brief,
				..JobOptions::default()
			},
		)
		.unwrap();
	wait_until("first dispatch", Duration::from_secs(5), || harness.engine.calls() >= 1).await;

	let stats = harness.cleanup.sweep();
	assert_eq!(stats.files_removed, 0, "file referenced by a running job must survive");
	assert!(path.exists());
	assert!(harness.files.contains(file_id));

	harness.scheduler.cancel(job_id).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn sweep_reclaims_files_once_jobs_are_terminal() {
	let harness = build_harness(MockEngine::ok());
	let file_id = upload(&harness, 60).await;
	let path = harness.files.get(file_id).unwrap().path;

	let job_id = harness.scheduler.submit_file(file_id, JobOptions::default()).unwrap();
	wait_until("job terminal", Duration::from_secs(10), || {
		harness.registry.job_status(job_id).map(JobStatus::is_terminal).unwrap_or(false)
	})
	.await;

	let stats = harness.cleanup.sweep();
	assert_eq!(stats.files_removed, 1);
	assert!(!path.exists());
	assert!(!harness.files.contains(file_id));
}

#[tokio::test(flavor = "multi_thread")]
async fn chunk_artifacts_are_reclaimed_when_the_job_settles() {
	let harness = build_harness(MockEngine::ok());
	let file_id = upload(&harness, 600).await;

	let job_id = harness
		.scheduler
		.submit_file(
			file_id,
			JobOptions {
				profile: ChunkProfile::Brief,
				..JobOptions::default()
			},
		)
		.unwrap();
	wait_until("job terminal", Duration::from_secs(10), || {
		harness.registry.job_status(job_id).map(JobStatus::is_terminal).unwrap_or(false)
	})
	.await;

	// terminal transition sweeps the owner right behind the status flip
	wait_until("artifacts reclaimed", Duration::from_secs(5), || harness.cleanup.tracker().is_empty()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_reclaims_the_jobs_artifacts() {
	let harness = build_harness(MockEngine::with_delay(300, 400));
	let file_id = upload(&harness, 600).await;

	let job_id = harness
		.scheduler
		.submit_file(
			file_id,
			JobOptions {
				profile: ChunkProfile::Brief,
				..JobOptions::default()
			},
		)
		.unwrap();
	wait_until("artifacts exist", Duration::from_secs(5), || !harness.cleanup.tracker().is_empty()).await;

	harness.scheduler.cancel(job_id).unwrap();
	// in-flight extraction may still land an artifact after the cancel
	// ack; the periodic sweep owns that leftover
	tokio::time::sleep(Duration::from_millis(600)).await;
	harness.cleanup.sweep();

	assert!(harness.cleanup.tracker().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn protected_artifacts_survive_even_emergency_sweeps() {
	let harness = build_harness_with(
		MockEngine::ok(),
		|config| config.min_free_disk_bytes = 1_000_000,
		Arc::new(|_| 0), // always under the floor
	);
	harness.cleanup.refresh_pressure();
	assert!(harness.cleanup.disk_pressure());

	let dir = harness.files.root().to_path_buf();
	let pinned = dir.join("session-spill.pcm");
	std::fs::write(&pinned, b"live session buffer").unwrap();
	harness.cleanup.tracker().register_protected(pinned.clone(), None);

	let stats = harness.cleanup.sweep();
	assert!(stats.emergency);
	assert!(pinned.exists(), "protected path deleted during emergency sweep");

	// once unprotected, the emergency sweep may take it regardless of age
	harness.cleanup.tracker().unprotect(&pinned);
	harness.cleanup.sweep();
	assert!(!pinned.exists());
}

// ============================================================================
// GRACE PERIOD & EMERGENCY MODE
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn grace_period_defers_deletion_of_fresh_orphans() {
	let harness = build_harness_with(MockEngine::ok(), |config| config.cleanup_grace_secs = 3600, Arc::new(|_| u64::MAX));

	let orphan = harness.files.root().join("orphan.wav");
	std::fs::write(&orphan, b"leftover").unwrap();
	harness.cleanup.tracker().register(orphan.clone(), None);

	let stats = harness.cleanup.sweep();
	assert_eq!(stats.artifacts_removed, 0, "orphan younger than the grace period must be kept");
	assert!(orphan.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn emergency_mode_bypasses_the_grace_period() {
	let harness = build_harness_with(
		MockEngine::ok(),
		|config| {
			config.cleanup_grace_secs = 3600;
			config.min_free_disk_bytes = 1_000_000;
		},
		Arc::new(|_| 0),
	);
	harness.cleanup.refresh_pressure();

	let orphan = harness.files.root().join("orphan.wav");
	std::fs::write(&orphan, b"leftover").unwrap();
	harness.cleanup.tracker().register(orphan.clone(), None);

	let stats = harness.cleanup.sweep();
	assert!(stats.emergency);
	assert_eq!(stats.artifacts_removed, 1);
	assert!(!orphan.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn pressure_flag_clears_when_space_recovers() {
	use std::sync::atomic::{AtomicU64, Ordering};

	let free = Arc::new(AtomicU64::new(0));
	let probe_free = Arc::clone(&free);
	let harness = build_harness_with(
		MockEngine::ok(),
		|config| config.min_free_disk_bytes = 1_000_000,
		Arc::new(move |_| probe_free.load(Ordering::SeqCst)),
	);

	harness.cleanup.refresh_pressure();
	assert!(harness.cleanup.disk_pressure());

	free.store(10_000_000, Ordering::SeqCst);
	harness.cleanup.refresh_pressure();
	assert!(!harness.cleanup.disk_pressure());

	// admission works again
	let file_id = upload(&harness, 10).await;
	assert!(harness.scheduler.submit_file(file_id, JobOptions::default()).is_ok());
}
