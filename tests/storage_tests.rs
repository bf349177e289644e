// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for media persistence

use chrono::Local;
use selfie_zone::backends::camera::types::{CameraFrame, Framerate};
use selfie_zone::pipelines::{MediaWriter, PhotoEncoder, PhotoPipeline, PostProcessingConfig};
use selfie_zone::storage::MediaCounts;
use selfie_zone::{MediaArtifact, MediaKind, MediaStore, StorageError};
use std::path::Path;
use uuid::Uuid;

fn frame(width: u32, height: u32, shade: u8) -> CameraFrame {
    let data = [shade, shade, shade, 255].repeat((width * height) as usize);
    CameraFrame::from_rgba(width, height, data)
}

fn photo() -> MediaArtifact {
    MediaArtifact::image(frame(8, 6, 128), Local::now(), Uuid::new_v4())
}

fn boomerang() -> MediaArtifact {
    let frames = (0..4).map(|i| frame(8, 6, i * 60)).collect();
    MediaArtifact::new(
        MediaKind::LoopedClip,
        frames,
        Framerate::from_int(10),
        Local::now(),
        Uuid::new_v4(),
    )
    .unwrap()
}

fn read_counts(dir: &Path) -> MediaCounts {
    let text = std::fs::read_to_string(dir.join("media_counts.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_saves_are_numbered_per_kind() {
    let dir = tempfile::tempdir().unwrap();
    let store = MediaStore::new(dir.path(), MediaWriter::default());

    let first = store.save(&photo()).unwrap();
    let second = store.save(&photo()).unwrap();
    let loop_path = store.save(&boomerang()).unwrap();

    assert_eq!(first, dir.path().join("saved_pictures/1.jpeg"));
    assert_eq!(second, dir.path().join("saved_pictures/2.jpeg"));
    assert_eq!(loop_path, dir.path().join("saved_boomerangs/1.gif"));
    assert_eq!(
        read_counts(dir.path()),
        MediaCounts {
            picture: 2,
            boomerang: 1,
            video: 0
        }
    );
}

#[test]
fn test_counter_survives_new_store() {
    let dir = tempfile::tempdir().unwrap();
    MediaStore::new(dir.path(), MediaWriter::default())
        .save(&photo())
        .unwrap();

    let reopened = MediaStore::new(dir.path(), MediaWriter::default());
    assert_eq!(reopened.get_count(MediaKind::Image).unwrap(), 1);
    let path = reopened.save(&photo()).unwrap();
    assert_eq!(path, dir.path().join("saved_pictures/2.jpeg"));
}

#[test]
fn test_existing_files_are_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let store = MediaStore::new(dir.path(), MediaWriter::default());
    store.initialize().unwrap();

    // Counter file lost, old pictures still there
    std::fs::write(dir.path().join("saved_pictures/1.jpeg"), b"old").unwrap();
    std::fs::remove_file(dir.path().join("media_counts.json")).unwrap();

    let path = store.save(&photo()).unwrap();
    assert_eq!(path, dir.path().join("saved_pictures/2.jpeg"));
    assert_eq!(
        std::fs::read(dir.path().join("saved_pictures/1.jpeg")).unwrap(),
        b"old"
    );
    assert_eq!(read_counts(dir.path()).picture, 2);
}

#[test]
fn test_photos_are_resized_before_saving() {
    let dir = tempfile::tempdir().unwrap();
    let photo_pipeline = PhotoPipeline::new(
        PostProcessingConfig {
            target_size: Some((40, 30)),
            watermark: None,
        },
        PhotoEncoder::default(),
    );
    let writer = MediaWriter::new(photo_pipeline, Default::default(), Default::default());
    let store = MediaStore::new(dir.path(), writer);

    let path = store.save(&photo()).unwrap();
    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (40, 30));
}

#[test]
fn test_concurrent_persists_get_distinct_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let store = MediaStore::new(dir.path(), MediaWriter::default());
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut paths = rt.block_on(async {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.persist(photo()).await })
            })
            .collect();
        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.await.unwrap().unwrap());
        }
        paths
    });

    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 4);
    assert_eq!(store.get_count(MediaKind::Image).unwrap(), 4);
}

#[test]
fn test_unwritable_output_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let store = MediaStore::new(&blocker, MediaWriter::default());

    assert!(matches!(store.save(&photo()), Err(StorageError::Io { .. })));
}
