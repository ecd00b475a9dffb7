use std::fs;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Result, SinkError};
use crate::video::ffmpeg::{quality_to_crf, FfmpegTools};
use crate::video::types::FrameStore;

/// External encoding collaborator that writes a finished store
pub trait VideoSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Write every frame of `store`, in order, to `path` at `frame_rate`
    fn encode(&self, store: &FrameStore, frame_rate: f64, path: &Path, scratch: &Path) -> Result<()>;
}

fn write_failed(path: &Path, reason: impl Into<String>) -> SinkError {
    SinkError::WriteFailed {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Write `frame_%08d.png` files (1-based, ffmpeg image2 convention) into `directory`
fn write_png_sequence(store: &FrameStore, directory: &Path) -> Result<()> {
    fs::create_dir_all(directory).map_err(|e| write_failed(directory, e.to_string()))?;

    store.frames().par_iter().try_for_each(|frame| -> Result<()> {
        let frame_path = directory.join(format!("frame_{:08}.png", frame.index() + 1));
        frame
            .save_png(&frame_path)
            .map_err(|e| write_failed(&frame_path, e.to_string()))?;
        Ok(())
    })
}

/// Move a finished file to `path`, copying when a rename crosses filesystems
fn move_into_place(staged: &Path, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_failed(path, e.to_string()))?;
    }

    if fs::rename(staged, path).is_ok() {
        return Ok(());
    }

    let copied = fs::copy(staged, path);
    let _ = fs::remove_file(staged);
    if let Err(e) = copied {
        let _ = fs::remove_file(path);
        return Err(write_failed(path, e.to_string()).into());
    }
    Ok(())
}

/// Remove `frame_*.png` files left in `directory` by an earlier write
fn clear_png_sequence(directory: &Path) -> Result<()> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(write_failed(directory, e.to_string()).into()),
    };

    let mut removed = 0;
    for entry in entries {
        let entry_path = entry.map_err(|e| write_failed(directory, e.to_string()))?.path();
        let is_frame = entry_path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("frame_") && name.ends_with(".png"));

        if is_frame && entry_path.is_file() {
            fs::remove_file(&entry_path).map_err(|e| write_failed(&entry_path, e.to_string()))?;
            removed += 1;
        }
    }

    if removed > 0 {
        debug!("Removed {} stale frames from {:?}", removed, directory);
    }
    Ok(())
}

/// Encodes frames into a video container through ffmpeg
pub struct FfmpegSink {
    tools: FfmpegTools,
    codec: String,
    quality: u8,
}

impl FfmpegSink {
    pub fn new(tools: FfmpegTools, codec: impl Into<String>, quality: u8) -> Self {
        Self {
            tools,
            codec: codec.into(),
            quality,
        }
    }
}

impl VideoSink for FfmpegSink {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn encode(&self, store: &FrameStore, frame_rate: f64, path: &Path, scratch: &Path) -> Result<()> {
        if store.is_empty() {
            warn!("No frames to encode; skipping container write for {:?}", path);
            return Ok(());
        }

        if !self.tools.ffmpeg_available() {
            return Err(write_failed(path, "FFmpeg not found. Please install FFmpeg.").into());
        }

        let frames_dir = scratch.join("encode");
        write_png_sequence(store, &frames_dir)?;

        // Encode next to the frames and move into place only on success
        let staged = match path.extension() {
            Some(ext) => scratch.join("encoded").with_extension(ext),
            None => scratch.join("encoded"),
        };

        let pattern = frames_dir.join("frame_%08d.png");
        let args: Vec<String> = vec![
            "-hide_banner".into(), "-loglevel".into(), "error".into(),
            "-framerate".into(), frame_rate.to_string(),
            "-i".into(), pattern.display().to_string(),
            "-c:v".into(), self.codec.clone(),
            "-pix_fmt".into(), "yuv420p".into(),
            "-crf".into(), quality_to_crf(self.quality).to_string(),
            "-y".into(),
            staged.display().to_string(),
        ];
        if let Err(reason) = self.tools.run_ffmpeg(&args) {
            let _ = fs::remove_file(&staged);
            return Err(write_failed(path, reason).into());
        }
        move_into_place(&staged, path)?;

        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        info!("Encoded {} frames to {:?} ({} KB)", store.len(), path, size / 1024);
        Ok(())
    }
}

/// Writes frames as a numbered PNG sequence into an output directory
pub struct ImageSequenceSink;

impl VideoSink for ImageSequenceSink {
    fn name(&self) -> &str {
        "image-sequence"
    }

    fn encode(&self, store: &FrameStore, _frame_rate: f64, path: &Path, _scratch: &Path) -> Result<()> {
        clear_png_sequence(path)?;
        write_png_sequence(store, path)?;
        info!("Wrote {} frames to {:?}", store.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::source::{ImageSequenceSource, VideoSource};
    use crate::video::types::Frame;
    use tempfile::tempdir;

    #[test]
    fn test_image_sequence_sink_preserves_order() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let frames = (0..12)
            .map(|i| Frame::new_filled(i, 3, 2, [i as u8 * 10, 0, 0]))
            .collect();
        let store = FrameStore::new(frames, 24.0).unwrap();

        ImageSequenceSink.encode(&store, 24.0, &out, dir.path()).unwrap();

        assert!(out.join("frame_00000001.png").exists());
        assert!(out.join("frame_00000012.png").exists());

        let reloaded = ImageSequenceSource::new(24.0).decode(&out, dir.path()).unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn test_empty_store_writes_empty_directory() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("empty_out");

        ImageSequenceSink.encode(&FrameStore::empty(30.0), 30.0, &out, dir.path()).unwrap();

        assert!(out.is_dir());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_rewrite_drops_stale_frames() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let long = FrameStore::new((0..5).map(|i| Frame::new_black(i, 2, 2)).collect(), 24.0).unwrap();
        let short = FrameStore::new((0..2).map(|i| Frame::new_filled(i, 2, 2, [9, 9, 9])).collect(), 24.0).unwrap();

        ImageSequenceSink.encode(&long, 24.0, &out, dir.path()).unwrap();
        std::fs::write(out.join("notes.txt"), b"keep me").unwrap();
        ImageSequenceSink.encode(&short, 24.0, &out, dir.path()).unwrap();

        assert!(!out.join("frame_00000003.png").exists());
        assert!(out.join("notes.txt").exists());
        let reloaded = ImageSequenceSource::new(24.0).decode(&out, dir.path()).unwrap();
        assert_eq!(reloaded, short);
    }

    /// Shell script standing in for ffmpeg: writes its last argument, then exits with `status`
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, status: i32) -> FfmpegTools {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffmpeg");
        let body = format!(
            "#!/bin/sh\n[ \"$1\" = \"-version\" ] && exit 0\nfor last; do :; done\necho partial > \"$last\"\nexit {}\n",
            status
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        FfmpegTools {
            ffmpeg: script,
            ffprobe: dir.join("ffprobe"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_encode_leaves_no_output() {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        let out = dir.path().join("out.mp4");
        let store = FrameStore::new(vec![Frame::new_black(0, 2, 2)], 24.0).unwrap();

        let sink = FfmpegSink::new(fake_ffmpeg(dir.path(), 1), "libx264", 85);
        let err = sink.encode(&store, 24.0, &out, &scratch).unwrap_err();

        assert!(matches!(err, crate::error::EnhanceError::Sink(SinkError::WriteFailed { .. })));
        assert!(!out.exists());
        assert!(!scratch.join("encoded.mp4").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_encode_moves_into_place() {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        let out = dir.path().join("videos").join("out.mp4");
        let store = FrameStore::new(vec![Frame::new_black(0, 2, 2)], 24.0).unwrap();

        let sink = FfmpegSink::new(fake_ffmpeg(dir.path(), 0), "libx264", 85);
        sink.encode(&store, 24.0, &out, &scratch).unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "partial\n");
        assert!(!scratch.join("encoded.mp4").exists());
    }

    #[test]
    fn test_ffmpeg_sink_accepts_empty_store() {
        let dir = tempdir().unwrap();
        let sink = FfmpegSink::new(FfmpegTools::locate(None), "libx264", 85);
        let out = dir.path().join("out.mp4");

        sink.encode(&FrameStore::empty(30.0), 30.0, &out, dir.path()).unwrap();
        assert!(!out.exists());
    }
}
