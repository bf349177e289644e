// SPDX-License-Identifier: GPL-3.0-only

//! Persistence of accepted media
//!
//! Each kind has its own folder under the output directory and a counter in
//! `media_counts.json`; the n-th accepted item of a kind is saved as `n.<ext>`:
//!
//! ```text
//! <output>/
//!   media_counts.json      {"picture":2,"boomerang":0,"video":1}
//!   saved_pictures/1.jpeg
//!   saved_pictures/2.jpeg
//!   saved_boomerangs/
//!   saved_videos/1.mp4
//! ```

use crate::config::Config;
use crate::constants::output;
use crate::errors::{StorageError, StorageResult};
use crate::media::{MediaArtifact, MediaKind};
use crate::pipelines::MediaWriter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Folder for a media kind, relative to the output directory
pub fn save_dir_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "saved_pictures",
        MediaKind::LoopedClip => "saved_boomerangs",
        MediaKind::Clip => "saved_videos",
    }
}

/// File extension for a media kind
pub fn extension(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "jpeg",
        MediaKind::LoopedClip => "gif",
        MediaKind::Clip => "mp4",
    }
}

/// Contents of the counter file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaCounts {
    pub picture: u64,
    pub boomerang: u64,
    pub video: u64,
}

impl MediaCounts {
    pub fn get(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.picture,
            MediaKind::LoopedClip => self.boomerang,
            MediaKind::Clip => self.video,
        }
    }

    /// Bump the counter for `kind` and return the new value
    pub fn increment(&mut self, kind: MediaKind) -> u64 {
        let counter = match kind {
            MediaKind::Image => &mut self.picture,
            MediaKind::LoopedClip => &mut self.boomerang,
            MediaKind::Clip => &mut self.video,
        };
        *counter += 1;
        *counter
    }

    /// Give back `count` if it is still the newest number of `kind`
    ///
    /// Returns whether the counter moved.
    pub fn release(&mut self, kind: MediaKind, count: u64) -> bool {
        let counter = match kind {
            MediaKind::Image => &mut self.picture,
            MediaKind::LoopedClip => &mut self.boomerang,
            MediaKind::Clip => &mut self.video,
        };
        if *counter == count && count > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

/// Numbered media files under an output directory
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    writer: MediaWriter,
    counts_lock: Arc<Mutex<()>>,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, writer: MediaWriter) -> Self {
        Self {
            root: root.into(),
            writer,
            counts_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Store for the configured output directory and encoders
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.output.directory(), MediaWriter::from_config(config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn counts_path(&self) -> PathBuf {
        self.root.join(output::COUNTS_FILE)
    }

    pub fn save_dir(&self, kind: MediaKind) -> PathBuf {
        self.root.join(save_dir_name(kind))
    }

    /// Path of the `count`-th item of a kind
    pub fn get_save_path(&self, kind: MediaKind, count: u64) -> PathBuf {
        self.save_dir(kind).join(format!("{}.{}", count, extension(kind)))
    }

    /// Create the save folders and a zeroed counter file if missing
    pub fn initialize(&self) -> StorageResult<()> {
        for kind in [MediaKind::Image, MediaKind::LoopedClip, MediaKind::Clip] {
            let dir = self.save_dir(kind);
            std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }
        if !self.counts_path().exists() {
            self.write_counts(&MediaCounts::default())?;
            debug!(path = %self.counts_path().display(), "Counter file created");
        }
        Ok(())
    }

    /// Current counter for a kind
    pub fn get_count(&self, kind: MediaKind) -> StorageResult<u64> {
        let _guard = self.lock_counts();
        Ok(self.load_counts()?.get(kind))
    }

    /// Increment a kind's counter and return the new value
    pub fn increment_count(&self, kind: MediaKind) -> StorageResult<u64> {
        let _guard = self.lock_counts();
        self.increment_locked(kind)
    }

    /// Encode and save an artifact under the next free number
    ///
    /// Blocking; see [`Self::persist`] for the async version. A failed write
    /// hands its number back so the next save reuses it.
    pub fn save(&self, artifact: &MediaArtifact) -> StorageResult<PathBuf> {
        let kind = artifact.kind();
        let (count, path) = {
            let _guard = self.lock_counts();
            self.initialize()?;
            loop {
                let count = self.increment_locked(kind)?;
                let path = self.get_save_path(kind, count);
                if !path.exists() {
                    break (count, path);
                }
                warn!(
                    path = %path.display(),
                    "Counter behind existing file, skipping number"
                );
            }
        };

        debug!(
            kind = %kind,
            session = %artifact.session_id(),
            path = %path.display(),
            "Saving artifact"
        );
        if let Err(e) = self.writer.write(artifact, &path) {
            self.release_count(kind, count);
            return Err(e);
        }
        info!(kind = %kind, path = %path.display(), "Artifact saved");
        Ok(path)
    }

    /// Undo the reservation of a failed save
    fn release_count(&self, kind: MediaKind, count: u64) {
        let _guard = self.lock_counts();
        let released = self.load_counts().and_then(|mut counts| {
            let moved = counts.release(kind, count);
            if moved {
                self.write_counts(&counts)?;
            }
            Ok(moved)
        });
        match released {
            Ok(true) => debug!(kind = %kind, count, "Counter rolled back after failed save"),
            Ok(false) => {}
            Err(e) => warn!(kind = %kind, error = %e, "Failed to roll back counter"),
        }
    }

    /// Save on tokio's blocking pool
    pub async fn persist(&self, artifact: MediaArtifact) -> StorageResult<PathBuf> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save(&artifact))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }

    fn lock_counts(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded value is (), a poisoned lock is still usable
        self.counts_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn increment_locked(&self, kind: MediaKind) -> StorageResult<u64> {
        let mut counts = self.load_counts()?;
        let count = counts.increment(kind);
        self.write_counts(&counts)?;
        Ok(count)
    }

    /// Read the counter file, starting from zero when it is missing or corrupt
    fn load_counts(&self) -> StorageResult<MediaCounts> {
        let path = self.counts_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MediaCounts::default());
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        match serde_json::from_str(&text) {
            Ok(counts) => Ok(counts),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Counter file unreadable, starting over"
                );
                Ok(MediaCounts::default())
            }
        }
    }

    fn write_counts(&self, counts: &MediaCounts) -> StorageResult<()> {
        let path = self.counts_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(counts)?)
            .map_err(|e| StorageError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StorageError::io(&path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> MediaStore {
        MediaStore::new(dir, MediaWriter::default())
    }

    #[test]
    fn test_counts_json_keys() {
        let counts = MediaCounts {
            picture: 5,
            boomerang: 3,
            video: 2,
        };
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json["picture"], 5);
        assert_eq!(json["boomerang"], 3);
        assert_eq!(json["video"], 2);
    }

    #[test]
    fn test_missing_keys_default_to_zero() {
        let counts: MediaCounts = serde_json::from_str(r#"{"picture":4}"#).unwrap();
        assert_eq!(counts.get(MediaKind::Image), 4);
        assert_eq!(counts.get(MediaKind::Clip), 0);
    }

    #[test]
    fn test_initialize_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.initialize().unwrap();

        assert!(dir.path().join("saved_pictures").is_dir());
        assert!(dir.path().join("saved_boomerangs").is_dir());
        assert!(dir.path().join("saved_videos").is_dir());
        let text = std::fs::read_to_string(dir.path().join("media_counts.json")).unwrap();
        let counts: MediaCounts = serde_json::from_str(&text).unwrap();
        assert_eq!(counts, MediaCounts::default());
    }

    #[test]
    fn test_release_only_newest() {
        let mut counts = MediaCounts {
            picture: 3,
            ..MediaCounts::default()
        };
        assert!(!counts.release(MediaKind::Image, 2));
        assert!(counts.release(MediaKind::Image, 3));
        assert_eq!(counts.picture, 2);
        assert!(!counts.release(MediaKind::Clip, 0));
    }

    #[test]
    fn test_failed_save_keeps_counter() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        // Claims 4x4 but carries a single pixel, so encoding fails
        let broken = crate::backends::camera::types::CameraFrame::from_rgba(4, 4, vec![0; 4]);
        let artifact = MediaArtifact::image(broken, chrono::Local::now(), uuid::Uuid::new_v4());

        assert!(store.save(&artifact).is_err());
        assert_eq!(store.get_count(MediaKind::Image).unwrap(), 0);
        assert!(!store.get_save_path(MediaKind::Image, 1).exists());
    }

    #[test]
    fn test_corrupt_counter_file_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("media_counts.json"), "not json").unwrap();
        let store = store(dir.path());
        assert_eq!(store.get_count(MediaKind::Image).unwrap(), 0);
        assert_eq!(store.increment_count(MediaKind::Image).unwrap(), 1);
    }
}
