use crate::audio::probe_wav;
use crate::error::JobEngineError;
use chrono::Utc;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use transcript_core::FileInfo;
use uuid::Uuid;

const ACCEPTED_MIME: &[&str] = &["audio/wav", "audio/x-wav", "audio/wave"];

/// Registry of uploaded source files.
///
/// Records are immutable once registered; removal is the cleanup sweeper's
/// call alone, after it has established no non-terminal job references the
/// file.
pub struct FileStore {
	root: PathBuf,
	max_file_bytes: u64,
	files: DashMap<Uuid, FileInfo>,
}

impl FileStore {
	pub fn new(root: PathBuf, max_file_bytes: u64) -> Result<Self, JobEngineError> {
		std::fs::create_dir_all(&root)?;
		Ok(Self {
			root,
			max_file_bytes,
			files: DashMap::new(),
		})
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Validate and persist one uploaded audio file.
	pub async fn register(&self, bytes: &[u8], mime_type: &str) -> Result<FileInfo, JobEngineError> {
		if !ACCEPTED_MIME.contains(&mime_type) {
			return Err(JobEngineError::Validation(format!("unsupported mime type: {mime_type}")));
		}
		let size_bytes = bytes.len() as u64;
		if size_bytes > self.max_file_bytes {
			return Err(JobEngineError::Validation(format!("file is {size_bytes} bytes, limit is {}", self.max_file_bytes)));
		}

		let probe = probe_wav(bytes)?;

		let id = Uuid::new_v4();
		let path = self.root.join(format!("{id}.wav"));
		tokio::fs::write(&path, bytes).await?;

		let info = FileInfo {
			id,
			size_bytes,
			duration_secs: probe.duration_secs,
			mime_type: mime_type.to_string(),
			path,
			created_at: Utc::now(),
		};

		info!(file_id = %id, size_bytes, duration_secs = info.duration_secs, "Registered audio file");
		self.files.insert(id, info.clone());
		Ok(info)
	}

	#[must_use]
	pub fn get(&self, id: Uuid) -> Option<FileInfo> {
		self.files.get(&id).map(|entry| entry.clone())
	}

	#[must_use]
	pub fn contains(&self, id: Uuid) -> bool {
		self.files.contains_key(&id)
	}

	/// All registered files, for the sweeper's eligibility pass.
	#[must_use]
	pub fn entries(&self) -> Vec<FileInfo> {
		self.files.iter().map(|entry| entry.clone()).collect()
	}

	/// Drop the record and delete the backing file. Only the cleanup
	/// sweeper calls this.
	pub fn remove(&self, id: Uuid) -> Option<PathBuf> {
		let (_, info) = self.files.remove(&id)?;
		if let Err(e) = std::fs::remove_file(&info.path) {
			debug!(file_id = %id, error = %e, "Backing file already gone");
		}
		Some(info.path)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.files.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	fn wav_fixture(seconds: u32) -> Vec<u8> {
		let spec = hound::WavSpec {
			channels: 1,
			sample_rate: 8000,
			bits_per_sample: 16,
			sample_format: hound::SampleFormat::Int,
		};
		let mut cursor = Cursor::new(Vec::new());
		{
			let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
			for _ in 0..(8000 * seconds) {
				writer.write_sample(0i16).unwrap();
			}
			writer.finalize().unwrap();
		}
		cursor.into_inner()
	}

	#[tokio::test]
	async fn register_probes_duration_and_persists() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path().to_path_buf(), 10_000_000).unwrap();

		let info = store.register(&wav_fixture(2), "audio/wav").await.unwrap();
		assert!((info.duration_secs - 2.0).abs() < 1e-9);
		assert!(info.path.exists());
		assert!(store.contains(info.id));
	}

	#[tokio::test]
	async fn register_rejects_wrong_mime() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path().to_path_buf(), 10_000_000).unwrap();

		let err = store.register(&wav_fixture(1), "audio/mpeg").await.unwrap_err();
		assert!(matches!(err, JobEngineError::Validation(_)));
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn register_rejects_oversized_upload() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path().to_path_buf(), 100).unwrap();

		let err = store.register(&wav_fixture(1), "audio/wav").await.unwrap_err();
		assert!(matches!(err, JobEngineError::Validation(_)));
	}

	#[tokio::test]
	async fn register_rejects_non_wav_payload() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path().to_path_buf(), 10_000_000).unwrap();

		assert!(store.register(b"definitely not wav", "audio/wav").await.is_err());
	}

	#[tokio::test]
	async fn remove_deletes_the_backing_file() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path().to_path_buf(), 10_000_000).unwrap();

		let info = store.register(&wav_fixture(1), "audio/wav").await.unwrap();
		let path = store.remove(info.id).unwrap();
		assert!(!path.exists());
		assert!(!store.contains(info.id));
	}
}
