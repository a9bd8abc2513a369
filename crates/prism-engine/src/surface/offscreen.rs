use std::rc::Rc;

use anyhow::{Result, anyhow};
use image::RgbaImage;
use winit::dpi::{LogicalSize, PhysicalSize};

use crate::device::GpuBackend;

use super::ReadbackCache;

/// Creates the backend that owns a drawing surface of a given device size.
///
/// Implemented for any `FnMut(PhysicalSize<u32>) -> Result<B>`.
pub trait SurfaceProvider<B> {
    fn create(&mut self, size: PhysicalSize<u32>) -> Result<B>;
}

impl<B, F> SurfaceProvider<B> for F
where
    F: FnMut(PhysicalSize<u32>) -> Result<B>,
{
    fn create(&mut self, size: PhysicalSize<u32>) -> Result<B> {
        self(size)
    }
}

/// GPU drawing surface sized in logical pixels.
///
/// Device size is `round(logical * device_scale)` per axis. The backend is
/// created lazily on the first [`ensure_surface`](Self::ensure_surface).
/// A creation failure is kept and returned from every later call.
pub struct OffscreenSurface<B: GpuBackend> {
    provider: Box<dyn SurfaceProvider<B>>,
    device_scale: f64,
    logical: LogicalSize<f64>,
    backend: Option<B>,
    failure: Option<String>,
    readback: ReadbackCache,
}

/// Proof that a surface exists and its context is current.
///
/// Every GPU operation of the renderer core goes through one of these.
pub struct Current<'a, B: GpuBackend> {
    backend: &'a mut B,
    readback: &'a mut ReadbackCache,
}

impl<B: GpuBackend> Current<'_, B> {
    #[inline]
    pub fn backend(&mut self) -> &mut B {
        &mut *self.backend
    }

    pub fn image(&mut self) -> Option<Rc<RgbaImage>> {
        self.readback.get_or_read(&mut *self.backend)
    }

    /// Splits into the backend and readback cache.
    pub fn parts(&mut self) -> (&mut B, &mut ReadbackCache) {
        (&mut *self.backend, &mut *self.readback)
    }
}

impl<B: GpuBackend> OffscreenSurface<B> {
    /// `device_scale` must be finite and positive.
    pub fn new(
        provider: impl SurfaceProvider<B> + 'static,
        device_scale: f64,
        logical: LogicalSize<f64>,
    ) -> Result<Self> {
        anyhow::ensure!(
            device_scale.is_finite() && device_scale > 0.0,
            "device scale must be finite and positive, got {device_scale}"
        );
        Ok(Self {
            provider: Box::new(provider),
            device_scale,
            logical,
            backend: None,
            failure: None,
            readback: ReadbackCache::new(),
        })
    }

    #[inline]
    pub fn device_scale(&self) -> f64 {
        self.device_scale
    }

    #[inline]
    pub fn logical_size(&self) -> LogicalSize<f64> {
        self.logical
    }

    /// Current size in device pixels.
    pub fn device_size(&self) -> PhysicalSize<u32> {
        to_device(self.logical, self.device_scale)
    }

    pub fn has_surface(&self) -> bool {
        self.backend.is_some()
    }

    /// Read-only view of the backend, if a surface exists.
    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn readback(&self) -> &ReadbackCache {
        &self.readback
    }

    /// Creates the surface at `logical` if needed.
    ///
    /// Idempotent for an unchanged size; a different size resizes.
    pub fn ensure_surface(&mut self, logical: LogicalSize<f64>) -> Result<()> {
        if let Some(reason) = &self.failure {
            return Err(anyhow!("surface creation failed earlier: {reason}"));
        }
        if self.backend.is_some() {
            self.resize(logical);
            return Ok(());
        }

        self.logical = logical;
        let size = self.device_size();
        match self.provider.create(size) {
            Ok(backend) => {
                log::debug!(
                    "offscreen surface created: {}x{} device px (scale {})",
                    size.width,
                    size.height,
                    self.device_scale
                );
                self.backend = Some(backend);
                self.readback.invalidate();
                Ok(())
            }
            Err(e) => {
                let e = e.context(format!(
                    "failed to create {}x{} offscreen surface",
                    size.width, size.height
                ));
                self.failure = Some(format!("{e:#}"));
                Err(e)
            }
        }
    }

    /// Resizes to `logical`; no-op if unchanged.
    ///
    /// Any actual change drops the cached image, whether or not a surface
    /// exists yet.
    pub fn resize(&mut self, logical: LogicalSize<f64>) {
        if logical == self.logical {
            return;
        }
        self.logical = logical;
        self.readback.invalidate();

        let size = self.device_size();
        if let Some(backend) = &mut self.backend {
            backend.resize(size);
            log::debug!("offscreen surface resized to {}x{} device px", size.width, size.height);
        }
    }

    /// Makes the surface's context current, if a surface exists.
    pub fn make_current(&mut self) -> Option<Current<'_, B>> {
        let backend = self.backend.as_mut()?;
        Some(Current {
            backend,
            readback: &mut self.readback,
        })
    }

    /// Cached framebuffer image, or `None` without a current context.
    pub fn image(&mut self) -> Option<Rc<RgbaImage>> {
        match self.make_current() {
            Some(mut current) => current.image(),
            None => {
                log::warn!("image requested without a current GPU context");
                None
            }
        }
    }

    /// Runs `release` with the context current, then detaches the surface.
    ///
    /// The detached backend is returned so the caller decides when it is
    /// dropped. Calling this again is a no-op.
    pub fn dispose(&mut self, release: impl FnOnce(&mut B)) -> Option<B> {
        self.readback.invalidate();
        let mut backend = self.backend.take()?;
        release(&mut backend);
        log::debug!("offscreen surface disposed");
        Some(backend)
    }
}

fn to_device(logical: LogicalSize<f64>, scale: f64) -> PhysicalSize<u32> {
    PhysicalSize::new(
        (logical.width * scale).round().max(0.0) as u32,
        (logical.height * scale).round().max(0.0) as u32,
    )
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::device::RecordingBackend;

    fn recording(size: PhysicalSize<u32>) -> Result<RecordingBackend> {
        Ok(RecordingBackend::new(size.width, size.height))
    }

    fn surface(scale: f64) -> OffscreenSurface<RecordingBackend> {
        OffscreenSurface::new(recording, scale, LogicalSize::new(0.0, 0.0)).unwrap()
    }

    // ── sizing ────────────────────────────────────────────────────────────

    #[test]
    fn device_size_applies_scale() {
        let mut s = surface(2.0);
        s.ensure_surface(LogicalSize::new(100.0, 100.0)).unwrap();
        assert_eq!(s.device_size(), PhysicalSize::new(200, 200));
        assert_eq!(s.make_current().unwrap().backend().size(), PhysicalSize::new(200, 200));
    }

    #[test]
    fn device_size_rounds() {
        let mut s = surface(1.5);
        s.ensure_surface(LogicalSize::new(11.0, 3.0)).unwrap();
        // 16.5 rounds away from zero, 4.5 likewise.
        assert_eq!(s.device_size(), PhysicalSize::new(17, 5));
    }

    #[test]
    fn rejects_invalid_scale() {
        let make = |scale: f64| -> Result<OffscreenSurface<RecordingBackend>> {
            OffscreenSurface::new(recording, scale, LogicalSize::new(1.0, 1.0))
        };
        assert!(make(0.0).is_err());
        assert!(make(-1.0).is_err());
        assert!(make(f64::NAN).is_err());
        assert!(make(f64::INFINITY).is_err());
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn ensure_surface_is_idempotent() {
        let created = Rc::new(Cell::new(0));
        let counter = Rc::clone(&created);
        let mut s = OffscreenSurface::new(
            move |size: PhysicalSize<u32>| -> Result<RecordingBackend> {
                counter.set(counter.get() + 1);
                Ok(RecordingBackend::new(size.width, size.height))
            },
            1.0,
            LogicalSize::new(10.0, 10.0),
        )
        .unwrap();

        s.ensure_surface(LogicalSize::new(10.0, 10.0)).unwrap();
        s.ensure_surface(LogicalSize::new(10.0, 10.0)).unwrap();

        assert_eq!(created.get(), 1);
        assert!(s.make_current().unwrap().backend().resizes().is_empty());
    }

    #[test]
    fn creation_failure_is_sticky() {
        let attempts = Rc::new(Cell::new(0));
        let counter = Rc::clone(&attempts);
        let mut s: OffscreenSurface<RecordingBackend> = OffscreenSurface::new(
            move |_: PhysicalSize<u32>| -> Result<RecordingBackend> {
                counter.set(counter.get() + 1);
                Err(anyhow!("no adapter"))
            },
            1.0,
            LogicalSize::new(10.0, 10.0),
        )
        .unwrap();

        let first = s.ensure_surface(LogicalSize::new(10.0, 10.0)).unwrap_err();
        let second = s.ensure_surface(LogicalSize::new(10.0, 10.0)).unwrap_err();

        assert!(format!("{first:#}").contains("no adapter"));
        assert!(format!("{second:#}").contains("no adapter"));
        assert_eq!(attempts.get(), 1);
        assert!(s.make_current().is_none());
    }

    #[test]
    fn image_without_surface_is_none() {
        let mut s = surface(1.0);
        assert!(s.make_current().is_none());
        assert!(s.image().is_none());
    }

    #[test]
    fn dispose_releases_once() {
        let mut s = surface(1.0);
        s.ensure_surface(LogicalSize::new(4.0, 4.0)).unwrap();

        let mut calls = 0;
        assert!(s.dispose(|_| calls += 1).is_some());
        assert!(s.dispose(|_| calls += 1).is_none());

        assert_eq!(calls, 1);
        assert!(!s.has_surface());
        assert!(s.image().is_none());
    }

    // ── resize / readback ─────────────────────────────────────────────────

    #[test]
    fn resize_rescales_and_invalidates() {
        let mut s = surface(2.0);
        s.ensure_surface(LogicalSize::new(100.0, 100.0)).unwrap();
        s.image().unwrap();
        assert!(s.readback().is_valid());

        s.resize(LogicalSize::new(50.0, 50.0));

        assert_eq!(s.device_size(), PhysicalSize::new(100, 100));
        assert!(!s.readback().is_valid());
        assert_eq!(
            s.make_current().unwrap().backend().size(),
            PhysicalSize::new(100, 100)
        );
    }

    #[test]
    fn unchanged_resize_keeps_cache() {
        let mut s = surface(1.0);
        s.ensure_surface(LogicalSize::new(8.0, 8.0)).unwrap();
        let a = s.image().unwrap();

        s.resize(LogicalSize::new(8.0, 8.0));

        let b = s.image().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(s.readback().reads(), 1);
    }

    #[test]
    fn resize_then_image_reads_exactly_once() {
        let mut s = surface(1.0);
        s.ensure_surface(LogicalSize::new(8.0, 8.0)).unwrap();
        s.image().unwrap();

        s.resize(LogicalSize::new(16.0, 8.0));
        let a = s.image().unwrap();
        let b = s.image().unwrap();

        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.dimensions(), (16, 8));
        assert_eq!(s.readback().reads(), 2);
    }
}
