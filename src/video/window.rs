use crate::error::{FrameError, Result};
use crate::video::types::{Frame, FrameStore};

/// Fixed-size temporal neighbourhood of frames centred on one position
///
/// Always holds `2 * radius + 1` references. Near the ends of the sequence the
/// same frame may appear more than once.
#[derive(Debug, Clone)]
pub struct FrameWindow<'a> {
    center_index: usize,
    radius: usize,
    frames: Vec<&'a Frame>,
}

impl<'a> FrameWindow<'a> {
    pub fn center_index(&self) -> usize {
        self.center_index
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn frames(&self) -> &[&'a Frame] {
        &self.frames
    }

    /// The frame at the centre of the window
    pub fn center(&self) -> &'a Frame {
        self.frames[self.radius]
    }

    /// Source indices the window resolved to, in window order
    pub fn indices(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.index()).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Builds reflection-padded temporal windows over a [`FrameStore`]
pub struct WindowBuilder;

impl WindowBuilder {
    /// Map a raw (possibly out of range) position into `[0, len)`
    ///
    /// Negative positions mirror around 0 and positions past the end mirror
    /// around the last index, without repeating the edge frame. The clamp
    /// catches radii larger than the sequence itself.
    pub fn reflect_index(raw: isize, len: usize) -> usize {
        let n = len as isize;
        let mapped = if raw < 0 {
            raw.abs()
        } else if raw >= n {
            n - 1 - (raw - n + 1)
        } else {
            raw
        };
        mapped.clamp(0, n - 1) as usize
    }

    /// Build the window of `2 * radius + 1` frames centred on `center_index`
    pub fn build(store: &FrameStore, center_index: usize, radius: usize) -> Result<FrameWindow<'_>> {
        let len = store.len();
        if center_index >= len {
            return Err(FrameError::IndexOutOfRange { index: center_index, len }.into());
        }

        let center = center_index as isize;
        let radius_i = radius as isize;
        let frames = (-radius_i..=radius_i)
            .map(|offset| &store.frames()[Self::reflect_index(center + offset, len)])
            .collect();

        Ok(FrameWindow {
            center_index,
            radius,
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_of(n: usize) -> FrameStore {
        let frames = (0..n)
            .map(|i| Frame::new_filled(i, 2, 2, [i as u8, 0, 0]))
            .collect();
        FrameStore::new(frames, 30.0).unwrap()
    }

    #[test]
    fn test_reflection_at_boundaries() {
        let store = store_of(10);

        assert_eq!(WindowBuilder::build(&store, 0, 2).unwrap().indices(), vec![2, 1, 0, 1, 2]);
        assert_eq!(WindowBuilder::build(&store, 1, 2).unwrap().indices(), vec![1, 0, 1, 2, 3]);
        assert_eq!(WindowBuilder::build(&store, 9, 2).unwrap().indices(), vec![7, 8, 9, 8, 7]);
        assert_eq!(WindowBuilder::build(&store, 5, 2).unwrap().indices(), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_window_length_is_fixed() {
        for n in 1..12 {
            let store = store_of(n);
            for radius in 0..5 {
                for center in 0..n {
                    let window = WindowBuilder::build(&store, center, radius).unwrap();
                    assert_eq!(window.len(), 2 * radius + 1);
                    assert_eq!(window.center().index(), center);
                    assert!(window.indices().iter().all(|&i| i < n));
                }
            }
        }
    }

    #[test]
    fn test_single_frame_video_repeats_only_frame() {
        let store = store_of(1);
        let window = WindowBuilder::build(&store, 0, 2).unwrap();

        assert_eq!(window.indices(), vec![0, 0, 0, 0, 0]);
        assert!(window.frames().iter().all(|f| std::ptr::eq(*f, &store.frames()[0])));
    }

    #[test]
    fn test_zero_radius_is_just_the_center() {
        let store = store_of(3);
        let window = WindowBuilder::build(&store, 2, 0).unwrap();
        assert_eq!(window.indices(), vec![2]);
    }

    #[test]
    fn test_out_of_range_center_is_rejected() {
        let store = store_of(3);
        assert!(WindowBuilder::build(&store, 3, 2).is_err());
        assert!(WindowBuilder::build(&FrameStore::empty(30.0), 0, 2).is_err());
    }
}
