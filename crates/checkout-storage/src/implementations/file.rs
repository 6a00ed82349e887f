//! File-based storage backend.
//!
//! Stores each entry as a binary file with a small fixed header carrying
//! expiry information. Writes go to a temporary file first and are renamed
//! into place, so a crash mid-write never leaves a corrupt entry behind.
//! This is the backend that makes checkout sessions survive a full process
//! restart.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use checkout_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StoreNamespace, ValidationError,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

/// Fixed-size entry header.
///
/// Binary layout (16 bytes):
/// - [0-3]: magic bytes "MKTS"
/// - [4-5]: version (u16, little-endian)
/// - [6-13]: expiry timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-15]: reserved
#[derive(Debug, Clone)]
struct EntryHeader {
	expires_at: u64,
}

impl EntryHeader {
	const MAGIC: &'static [u8; 4] = b"MKTS";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0 // never expires
		} else {
			now_unix().saturating_add(ttl.as_secs())
		};
		Self { expires_at }
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&Self::VERSION.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("entry too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("bad entry magic".into()));
		}
		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"unsupported entry version: {}",
				version
			)));
		}
		let mut expiry = [0u8; 8];
		expiry.copy_from_slice(&bytes[6..14]);
		Ok(Self {
			expires_at: u64::from_le_bytes(expiry),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && now_unix() >= self.expires_at
	}
}

fn now_unix() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}

/// Per-namespace TTLs read from configuration.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StoreNamespace, Duration>,
}

impl TtlConfig {
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();
		if let Some(table) = config.as_table() {
			for namespace in StoreNamespace::all() {
				let config_key = format!("ttl_{}", namespace.as_str());
				if let Some(seconds) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.map(|v| v as u64)
				{
					ttls.insert(namespace, Duration::from_secs(seconds));
				}
			}
		}
		Self { ttls }
	}

	fn ttl_for(&self, namespace: StoreNamespace) -> Duration {
		self.ttls.get(&namespace).copied().unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Directory holding one file per entry.
	base_path: PathBuf,
	/// Per-namespace TTLs applied when the caller passes none.
	ttl_config: TtlConfig,
}

impl FileStorage {
	/// Creates a new FileStorage rooted at `base_path`.
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	fn file_path(&self, key: &str) -> PathBuf {
		// Keys carry a "namespace:id" shape; keep them filesystem-safe.
		let safe_key = key.replace(['/', ':'], "_");
		self.base_path.join(format!("{}.bin", safe_key))
	}

	fn default_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");
		namespace
			.parse::<StoreNamespace>()
			.map(|ns| self.ttl_config.ttl_for(ns))
			.unwrap_or(Duration::ZERO)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.file_path(key);

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			}
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = EntryHeader::deserialize(&data)?;
		if header.is_expired() {
			return Err(StorageError::NotFound);
		}
		Ok(data[EntryHeader::SIZE..].to_vec())
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let ttl = ttl.unwrap_or_else(|| self.default_ttl_for_key(key));
		let header = EntryHeader::new(ttl);

		let mut file_data = Vec::with_capacity(EntryHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		// Write-then-rename keeps the entry intact across a crash.
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		match self.get_bytes(key).await {
			Ok(_) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			match fs::read(&path).await {
				Ok(data) => {
					if let Ok(header) = EntryHeader::deserialize(&data) {
						if header.is_expired() {
							if let Err(e) = fs::remove_file(&path).await {
								tracing::warn!("failed to remove expired entry {:?}: {}", path, e);
							} else {
								removed += 1;
							}
						}
					}
				}
				Err(e) => {
					tracing::debug!("skipping unreadable entry {:?}: {}", path, e);
				}
			}
		}
		Ok(removed)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional = vec![Field::new("storage_path", FieldType::String)];
		for namespace in StoreNamespace::all() {
			optional.push(Field::new(
				format!("ttl_{}", namespace.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}
		Schema::new(vec![], optional).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory for entries (default: "./data/sessions")
/// - `ttl_sessions`: TTL in seconds for checkout sessions (default: 0)
/// - `ttl_message_retries`: TTL in seconds for message-retry markers (default: 0)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/sessions")
		.to_string();

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	fn storage_in(dir: &tempfile::TempDir) -> FileStorage {
		FileStorage::new(dir.path().to_path_buf(), TtlConfig::default())
	}

	#[tokio::test]
	async fn roundtrip_and_delete() {
		let dir = tempfile::tempdir().unwrap();
		let storage = storage_in(&dir);

		storage
			.set_bytes("sessions:listing-1", b"payload".to_vec(), None)
			.await
			.unwrap();
		assert_eq!(
			storage.get_bytes("sessions:listing-1").await.unwrap(),
			b"payload".to_vec()
		);

		storage.delete("sessions:listing-1").await.unwrap();
		assert!(matches!(
			storage.get_bytes("sessions:listing-1").await,
			Err(StorageError::NotFound)
		));

		// Deleting again is fine.
		storage.delete("sessions:listing-1").await.unwrap();
	}

	#[tokio::test]
	async fn entries_survive_a_new_instance_over_the_same_directory() {
		let dir = tempfile::tempdir().unwrap();

		{
			let storage = storage_in(&dir);
			storage
				.set_bytes("sessions:listing-2", b"resume me".to_vec(), None)
				.await
				.unwrap();
		}

		// A fresh instance simulates the process restart a reload causes.
		let storage = storage_in(&dir);
		assert_eq!(
			storage.get_bytes("sessions:listing-2").await.unwrap(),
			b"resume me".to_vec()
		);
	}

	#[tokio::test]
	async fn expired_entries_read_as_missing_and_are_swept() {
		let dir = tempfile::tempdir().unwrap();
		let storage = storage_in(&dir);

		storage
			.set_bytes("sessions:old", b"x".to_vec(), Some(Duration::from_secs(1)))
			.await
			.unwrap();
		storage
			.set_bytes("sessions:fresh", b"y".to_vec(), None)
			.await
			.unwrap();

		tokio::time::sleep(Duration::from_millis(1100)).await;

		assert!(matches!(
			storage.get_bytes("sessions:old").await,
			Err(StorageError::NotFound)
		));
		assert!(storage.exists("sessions:fresh").await.unwrap());

		let removed = storage.cleanup_expired().await.unwrap();
		assert_eq!(removed, 1);
	}

	#[tokio::test]
	async fn keys_are_sanitized_for_the_filesystem() {
		let dir = tempfile::tempdir().unwrap();
		let storage = storage_in(&dir);

		storage
			.set_bytes("sessions:user/1:listing/2", b"z".to_vec(), None)
			.await
			.unwrap();
		assert!(storage.exists("sessions:user/1:listing/2").await.unwrap());
	}
}
