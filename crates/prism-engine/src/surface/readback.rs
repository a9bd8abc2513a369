use std::rc::Rc;

use image::RgbaImage;

use crate::device::{GpuBackend, Origin};

/// CPU copy of the last rendered framebuffer.
///
/// The image is read on first request and handed out as a shared `Rc` until
/// [`invalidate`](Self::invalidate) is called (resize, new frame, disposal).
#[derive(Debug, Default)]
pub struct ReadbackCache {
    image: Option<Rc<RgbaImage>>,
    reads: usize,
}

impl ReadbackCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.image = None;
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.image.is_some()
    }

    /// Number of framebuffer reads performed so far.
    #[inline]
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Returns the cached image, reading the framebuffer if there is none.
    ///
    /// Rows are returned top row first regardless of the backend origin.
    /// A failed read is logged and yields `None`; the next call retries.
    pub fn get_or_read<B: GpuBackend>(&mut self, backend: &mut B) -> Option<Rc<RgbaImage>> {
        if let Some(image) = &self.image {
            return Some(Rc::clone(image));
        }

        self.reads += 1;
        let mut image = match backend.read_pixels() {
            Ok(image) => image,
            Err(e) => {
                log::error!("framebuffer readback failed: {e:#}");
                return None;
            }
        };
        if backend.framebuffer_origin() == Origin::BottomLeft {
            image::imageops::flip_vertical_in_place(&mut image);
        }

        let image = Rc::new(image);
        self.image = Some(Rc::clone(&image));
        Some(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingBackend;

    #[test]
    fn second_request_reuses_cached_image() {
        let mut backend = RecordingBackend::new(4, 4);
        let mut cache = ReadbackCache::new();

        let a = cache.get_or_read(&mut backend).unwrap();
        let b = cache.get_or_read(&mut backend).unwrap();

        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(backend.reads(), 1);
        assert_eq!(cache.reads(), 1);
    }

    #[test]
    fn invalidate_forces_fresh_read() {
        let mut backend = RecordingBackend::new(4, 4);
        let mut cache = ReadbackCache::new();

        let a = cache.get_or_read(&mut backend).unwrap();
        cache.invalidate();
        assert!(!cache.is_valid());
        let b = cache.get_or_read(&mut backend).unwrap();

        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(backend.reads(), 2);
    }

    #[test]
    fn top_left_rows_are_kept() {
        let mut backend = RecordingBackend::new(2, 3);
        let image = ReadbackCache::new().get_or_read(&mut backend).unwrap();
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(0, 2)[0], 2);
    }

    #[test]
    fn bottom_left_rows_are_flipped() {
        let mut backend = RecordingBackend::new(2, 3).with_origin(Origin::BottomLeft);
        let image = ReadbackCache::new().get_or_read(&mut backend).unwrap();
        assert_eq!(image.get_pixel(0, 0)[0], 2);
        assert_eq!(image.get_pixel(1, 2)[0], 0);
    }

    #[test]
    fn failed_read_is_not_cached() {
        let mut backend = RecordingBackend::new(2, 2);
        backend.set_fail_reads(true);
        let mut cache = ReadbackCache::new();

        assert!(cache.get_or_read(&mut backend).is_none());
        assert!(!cache.is_valid());

        backend.set_fail_reads(false);
        assert!(cache.get_or_read(&mut backend).is_some());
        assert_eq!(backend.reads(), 2);
    }
}
