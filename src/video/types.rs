use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Colour space tag carried by every frame
///
/// Conversion into one of these happens before a frame enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Rgb,
}

/// Represents a single decoded video frame
///
/// A frame wraps a row-major 3-channel image buffer together with its
/// position in the original sequence. Frames are never mutated once they are
/// part of a [`FrameStore`]; transforms always produce new frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    index: usize,
    buffer: RgbImage,
    colorspace: ColorSpace,
}

impl Frame {
    /// Create a new RGB frame from an image buffer
    pub fn new(index: usize, buffer: RgbImage) -> Self {
        Self {
            index,
            buffer,
            colorspace: ColorSpace::Rgb,
        }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(index: usize, width: u32, height: u32) -> Self {
        Self::new(index, ImageBuffer::new(width, height))
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(index: usize, width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self::new(index, buffer)
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(index: usize, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        let actual = data.len();
        ImageBuffer::from_raw(width, height, data)
            .map(|buffer| Self::new(index, buffer))
            .ok_or_else(|| {
                FrameError::InvalidBuffer {
                    reason: format!("{}x{} needs {} bytes, got {}", width, height, expected, actual),
                }
                .into()
            })
    }

    /// Tag the frame with a colour space
    pub fn with_colorspace(mut self, colorspace: ColorSpace) -> Self {
        self.colorspace = colorspace;
        self
    }

    /// Return the same pixels at a new sequence position
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn colorspace(&self) -> ColorSpace {
        self.colorspace
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw row-major RGB samples
    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> std::result::Result<(), image::ImageError> {
        self.buffer.save_with_format(path, image::ImageFormat::Png)
    }
}

/// Ordered, dense, randomly indexable frames of one video
///
/// Every stage hands a brand new store to the next one, so a store is
/// read-only once built and can be shared across worker threads.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStore {
    frames: Vec<Frame>,
    frame_rate: f64,
}

impl FrameStore {
    /// Build a store from frames in sequence order
    ///
    /// Frames are re-indexed to their position and must all share one size.
    pub fn new(frames: Vec<Frame>, frame_rate: f64) -> Result<Self> {
        let frames: Vec<Frame> = frames
            .into_iter()
            .enumerate()
            .map(|(i, frame)| frame.with_index(i))
            .collect();

        if let Some(first) = frames.first() {
            let (expected_width, expected_height) = first.dimensions();
            if let Some(bad) = frames.iter().find(|f| f.dimensions() != (expected_width, expected_height)) {
                return Err(FrameError::DimensionMismatch {
                    index: bad.index(),
                    expected_width,
                    expected_height,
                    actual_width: bad.width(),
                    actual_height: bad.height(),
                }
                .into());
            }
        }

        Ok(Self { frames, frame_rate })
    }

    /// Create an empty store
    pub fn empty(frame_rate: f64) -> Self {
        Self {
            frames: Vec::new(),
            frame_rate,
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Get the total number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Shared frame resolution, `None` for an empty store
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.frames.first().map(Frame::dimensions)
    }

    /// Get frames as an iterator
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_reindexes_frames() {
        let frames = vec![
            Frame::new_filled(7, 4, 4, [1, 2, 3]),
            Frame::new_filled(3, 4, 4, [4, 5, 6]),
        ];
        let store = FrameStore::new(frames, 25.0).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.frames()[0].index(), 0);
        assert_eq!(store.frames()[1].index(), 1);
        assert_eq!(store.frames()[1].get_pixel(0, 0), [4, 5, 6]);
        assert_eq!(store.resolution(), Some((4, 4)));
        assert_eq!(store.frame_rate(), 25.0);
    }

    #[test]
    fn test_store_rejects_mixed_resolutions() {
        let frames = vec![Frame::new_black(0, 8, 8), Frame::new_black(1, 8, 4)];
        let result = FrameStore::new(frames, 30.0);

        match result {
            Err(crate::error::EnhanceError::Frame(FrameError::DimensionMismatch { index, actual_height, .. })) => {
                assert_eq!(index, 1);
                assert_eq!(actual_height, 4);
            }
            other => panic!("Expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_store() {
        let store = FrameStore::empty(24.0);
        assert!(store.is_empty());
        assert_eq!(store.resolution(), None);
    }

    #[test]
    fn test_from_rgb_bytes_validates_length() {
        assert!(Frame::from_rgb_bytes(0, 2, 2, vec![0; 12]).is_ok());
        assert!(Frame::from_rgb_bytes(0, 2, 2, vec![0; 11]).is_err());
    }
}
