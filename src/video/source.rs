use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Result, SourceError};
use crate::video::ffmpeg::{parse_frame_rate, FfmpegTools};
use crate::video::types::{ColorSpace, Frame, FrameStore};

/// External decoding collaborator that materialises a whole video as frames
pub trait VideoSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Decode `path` into an ordered [`FrameStore`]
    ///
    /// `scratch` is a directory owned by the current run that the source may
    /// use for intermediate files. A video with zero frames is a valid,
    /// empty store.
    fn decode(&self, path: &Path, scratch: &Path) -> Result<FrameStore>;
}

fn unavailable(path: &Path, reason: impl Into<String>) -> SourceError {
    SourceError::Unavailable {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

fn is_image_file(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "png" | "jpg" | "jpeg" | "bmp" | "tiff" | "tif" | "webp"
        ),
        None => false,
    }
}

fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// List image files in a directory, sorted by file name
fn list_images(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory).map_err(|e| unavailable(directory, e.to_string()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| unavailable(directory, e.to_string()))?.path();
        if path.is_file() && !is_hidden_file(&path) && is_image_file(&path) {
            paths.push(path);
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Load images in parallel; rayon keeps the collected order equal to `paths`
fn load_frames(paths: &[PathBuf]) -> Result<Vec<Frame>> {
    paths
        .par_iter()
        .enumerate()
        .map(|(index, path)| -> Result<Frame> {
            let image = image::open(path).map_err(|e| unavailable(path, e.to_string()))?;
            Ok(Frame::new(index, image.to_rgb8()).with_colorspace(ColorSpace::Rgb))
        })
        .collect()
}

/// Decodes video containers by extracting PNG frames with ffmpeg
pub struct FfmpegSource {
    tools: FfmpegTools,
}

impl FfmpegSource {
    pub fn new(tools: FfmpegTools) -> Self {
        Self { tools }
    }

    fn probe_frame_rate(&self, path: &Path) -> Result<f64> {
        let args: Vec<String> = [
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=r_frame_rate",
            "-of", "default=noprint_wrappers=1:nokey=1",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(path.display().to_string()))
        .collect();

        let output = self
            .tools
            .run_ffprobe(&args)
            .map_err(|reason| unavailable(path, reason))?;

        let raw = output.lines().next().unwrap_or("").trim().to_string();
        parse_frame_rate(&raw).ok_or_else(|| {
            SourceError::InvalidFrameRate {
                path: path.display().to_string(),
                value: raw,
            }
            .into()
        })
    }
}

impl VideoSource for FfmpegSource {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn decode(&self, path: &Path, scratch: &Path) -> Result<FrameStore> {
        if !path.is_file() {
            return Err(unavailable(path, "file does not exist").into());
        }

        let frame_rate = self.probe_frame_rate(path)?;
        info!("Decoding {:?} at {:.3} fps", path, frame_rate);

        let frames_dir = scratch.join("frames");
        fs::create_dir_all(&frames_dir).map_err(|e| unavailable(path, e.to_string()))?;

        let pattern = frames_dir.join("frame_%08d.png");
        let args: Vec<String> = vec![
            "-hide_banner".into(), "-loglevel".into(), "error".into(),
            "-i".into(), path.display().to_string(),
            "-vsync".into(), "0".into(),
            "-f".into(), "image2".into(),
            "-pix_fmt".into(), "rgb24".into(),
            pattern.display().to_string(),
        ];
        self.tools
            .run_ffmpeg(&args)
            .map_err(|reason| unavailable(path, reason))?;

        let paths = list_images(&frames_dir)?;
        if paths.is_empty() {
            warn!("{:?} decoded to zero frames", path);
        }

        let frames = load_frames(&paths)?;
        info!("Decoded {} frames", frames.len());
        FrameStore::new(frames, frame_rate)
    }
}

/// Reads a directory of still images as one video, in file name order
pub struct ImageSequenceSource {
    frame_rate: f64,
}

impl ImageSequenceSource {
    pub fn new(frame_rate: f64) -> Self {
        Self { frame_rate }
    }
}

impl VideoSource for ImageSequenceSource {
    fn name(&self) -> &str {
        "image-sequence"
    }

    fn decode(&self, path: &Path, _scratch: &Path) -> Result<FrameStore> {
        if !path.is_dir() {
            return Err(unavailable(path, "not a directory").into());
        }

        let paths = list_images(path)?;
        debug!("Found {} images in {:?}", paths.len(), path);

        let frames = load_frames(&paths)?;
        info!("Loaded {} frames from image sequence", frames.len());
        FrameStore::new(frames, self.frame_rate)
    }
}
