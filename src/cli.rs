// SPDX-License-Identifier: GPL-3.0-only

//! Headless commands
//!
//! - Listing cameras, formats and video encoders
//! - Capturing a photo, boomerang or video without the review screen
//! - Printing the effective configuration

use selfie_zone::backends::camera::{CameraBackendManager, CameraBackendType};
use selfie_zone::capture::{CaptureController, CaptureMode, CaptureProgress, SessionPhase};
use selfie_zone::config::Config;
use selfie_zone::pipelines::video::available_encoders;
use selfie_zone::storage::MediaStore;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// List all cameras of a backend
pub fn list_cameras(backend: CameraBackendType) -> Result<(), Box<dyn std::error::Error>> {
    let manager = CameraBackendManager::new(backend);
    if !manager.is_available() {
        println!("Backend: {} (not available on this system)", backend);
        return Ok(());
    }
    let cameras = manager.enumerate_cameras().unwrap_or_default();

    println!("Backend: {}", backend);
    if cameras.is_empty() {
        println!("No cameras found.");
    } else {
        println!("Available cameras:");
        println!();
        for (index, camera) in cameras.iter().enumerate() {
            println!("  [{}] {}", index, camera.name);

            let formats = manager.get_formats(camera).unwrap_or_default();
            if !formats.is_empty() {
                // Best framerate per resolution
                let mut resolutions: Vec<(u32, u32, u32)> = Vec::new();
                for format in &formats {
                    let fps = format.framerate.map(|f| f.as_int()).unwrap_or(30);
                    if let Some(existing) = resolutions
                        .iter_mut()
                        .find(|(w, h, _)| *w == format.width && *h == format.height)
                    {
                        existing.2 = existing.2.max(fps);
                    } else {
                        resolutions.push((format.width, format.height, fps));
                    }
                }
                resolutions.sort_by(|a, b| (b.0 * b.1).cmp(&(a.0 * a.1)));

                let res_strs: Vec<String> = resolutions
                    .iter()
                    .take(3)
                    .map(|(w, h, fps)| format!("{}x{}@{}fps", w, h, fps))
                    .collect();
                println!("      Formats: {}", res_strs.join(", "));
            }
            println!();
        }
    }

    let encoders = available_encoders();
    if encoders.is_empty() {
        println!("Video encoders: none (videos cannot be saved)");
    } else {
        let names: Vec<String> = encoders
            .iter()
            .map(|e| {
                if e.is_hardware {
                    format!("{} (hardware)", e.display_name)
                } else {
                    e.display_name.to_string()
                }
            })
            .collect();
        println!("Video encoders: {}", names.join(", "));
    }

    Ok(())
}

/// Capture one item and save it without review
///
/// `duration` overrides the recording window of boomerangs and videos. A
/// video without a duration records until Ctrl+C.
pub fn capture(
    config: &Config,
    mode: CaptureMode,
    duration: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    if let Some(secs) = duration {
        apply_duration(&mut config, mode, secs)?;
    }

    let camera = CameraBackendManager::new(config.camera.backend);
    let mut controller = CaptureController::new(camera, &config);
    let until_stop = mode == CaptureMode::Video && duration.is_none();
    controller.record_video_until_stop(until_stop);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    if until_stop {
        println!("Recording until Ctrl+C");
    }

    let artifact = controller.capture_blocking(mode, &stop_flag, print_progress)?;
    println!();
    println!(
        "Captured {} ({} frames at {} fps)",
        mode,
        artifact.frame_count(),
        artifact.framerate()
    );

    let store = MediaStore::from_config(&config);
    let rt = tokio::runtime::Runtime::new()?;
    let path = rt.block_on(store.persist(artifact))?;
    println!("Saved: {}", path.display());

    Ok(())
}

/// Override the recording window of `mode` with `secs`
fn apply_duration(config: &mut Config, mode: CaptureMode, secs: f64) -> Result<(), String> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("Duration must be greater than 0 (got {})", secs));
    }
    let window_ms = (secs * 1000.0).round() as u64;
    if window_ms == 0 {
        return Err(format!(
            "Duration {} s is shorter than 1 ms; use at least 0.001",
            secs
        ));
    }
    match mode {
        CaptureMode::Boomerang => config.timing.boomerang_window_ms = window_ms,
        CaptureMode::Video => config.timing.video_window_ms = window_ms,
        CaptureMode::Photo => {}
    }
    Ok(())
}

fn print_progress(progress: &CaptureProgress) {
    match progress.phase {
        SessionPhase::Countdown { .. } => {
            if let Some(secs) = progress.countdown_secs() {
                print!("\r{}... ", secs);
            }
        }
        SessionPhase::Recording { .. } | SessionPhase::Finished => {
            print!("\rCapturing {}   ", progress.mode);
        }
    }
    let _ = std::io::stdout().flush();
}

/// Print the config file location and the effective configuration
pub fn show_config(config: &Config, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let status = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("# Config file: {}{}", path.display(), status);
    println!("# Output directory: {}", config.output.directory().display());
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_sets_window() {
        let mut config = Config::default();
        apply_duration(&mut config, CaptureMode::Video, 2.5).unwrap();
        assert_eq!(config.timing.video_window_ms, 2500);
        apply_duration(&mut config, CaptureMode::Boomerang, 0.75).unwrap();
        assert_eq!(config.timing.boomerang_window_ms, 750);
    }

    #[test]
    fn test_duration_rejects_sub_millisecond() {
        let mut config = Config::default();
        let err = apply_duration(&mut config, CaptureMode::Video, 0.0001).unwrap_err();
        assert!(err.contains("shorter than 1 ms"));
        assert_eq!(config.timing, Config::default().timing);
    }

    #[test]
    fn test_duration_rejects_non_positive() {
        let mut config = Config::default();
        assert!(apply_duration(&mut config, CaptureMode::Boomerang, 0.0).is_err());
        assert!(apply_duration(&mut config, CaptureMode::Boomerang, -1.0).is_err());
        assert!(apply_duration(&mut config, CaptureMode::Boomerang, f64::NAN).is_err());
    }
}
