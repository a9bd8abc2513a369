use std::rc::Rc;

use anyhow::{Result, anyhow};
use image::RgbaImage;
use winit::dpi::{LogicalSize, PhysicalSize};

use crate::device::{GpuBackend, GpuInit, WgpuBackend};
use crate::program::{ProgramCache, ShaderLibrary};
use crate::scene::{CameraTransforms, Shape, traverse};
use crate::surface::{OffscreenSurface, SurfaceProvider};

use super::{DrawEncoder, Encoded, TextureCache};

/// Renderer construction parameters.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Device pixels per logical pixel. Must be finite and positive.
    pub device_scale: f64,

    /// Initial surface size in logical pixels.
    pub logical_size: LogicalSize<f64>,

    /// GPU setup, including the frame clear color.
    pub gpu: GpuInit,

    /// Shader sources the programs are built from.
    pub shaders: ShaderLibrary,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            device_scale: 1.0,
            logical_size: LogicalSize::new(640.0, 480.0),
            gpu: GpuInit::default(),
            shaders: ShaderLibrary::default(),
        }
    }
}

/// Counters for one [`Renderer::render`] call.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Units visited by the traversal.
    pub units: usize,
    /// Units submitted to the backend.
    pub draws: usize,
    /// Of `draws`, how many were indexed.
    pub indexed_draws: usize,
    pub skipped: usize,
}

impl FrameStats {
    fn record(&mut self, encoded: Encoded) {
        self.units += 1;
        match encoded {
            Encoded::Indexed => {
                self.draws += 1;
                self.indexed_draws += 1;
            }
            Encoded::Arrays => self.draws += 1,
            Encoded::Skipped => self.skipped += 1,
        }
    }
}

/// Host 2D drawing surface the rendered image is composited into.
pub trait Painter {
    /// Draws `image` scaled to `logical_width` x `logical_height`.
    fn draw_image(&mut self, image: &RgbaImage, logical_width: f64, logical_height: f64);
}

/// Offscreen renderer for one scene view.
///
/// Owns its surface and its program and texture caches; nothing is shared
/// between renderer instances. Dropping a renderer disposes it.
pub struct Renderer<B: GpuBackend> {
    surface: OffscreenSurface<B>,
    programs: ProgramCache<B>,
    textures: TextureCache<B>,
    clear_color: [f64; 4],
}

impl Renderer<WgpuBackend> {
    /// Renderer drawing through a headless wgpu device.
    ///
    /// The device is created on the first render.
    pub fn with_wgpu(config: RendererConfig) -> Result<Self> {
        let gpu = config.gpu.clone();
        Self::new(
            config,
            move |size: PhysicalSize<u32>| -> Result<WgpuBackend> {
                pollster::block_on(WgpuBackend::new(size, &gpu))
            },
        )
    }
}

impl<B: GpuBackend> Renderer<B> {
    pub fn new(config: RendererConfig, provider: impl SurfaceProvider<B> + 'static) -> Result<Self> {
        let surface = OffscreenSurface::new(provider, config.device_scale, config.logical_size)?;
        Ok(Self {
            surface,
            programs: ProgramCache::new(config.shaders),
            textures: TextureCache::new(),
            clear_color: config.gpu.clear_color,
        })
    }

    #[inline]
    pub fn logical_size(&self) -> LogicalSize<f64> {
        self.surface.logical_size()
    }

    #[inline]
    pub fn device_size(&self) -> PhysicalSize<u32> {
        self.surface.device_size()
    }

    pub fn programs(&self) -> &ProgramCache<B> {
        &self.programs
    }

    pub fn textures(&self) -> &TextureCache<B> {
        &self.textures
    }

    pub fn surface(&self) -> &OffscreenSurface<B> {
        &self.surface
    }

    pub fn set_clear_color(&mut self, color: [f64; 4]) {
        self.clear_color = color;
    }

    /// Draws the visible part of `scene` into the offscreen surface.
    ///
    /// Creates the surface on first use. Fails only when the surface cannot
    /// be created, now or on any earlier call.
    pub fn render(&mut self, camera: &CameraTransforms, scene: &Shape) -> Result<FrameStats> {
        self.surface.ensure_surface(self.surface.logical_size())?;
        let mut current = self
            .surface
            .make_current()
            .ok_or_else(|| anyhow!("offscreen surface is not available"))?;
        let (backend, readback) = current.parts();

        readback.invalidate();
        backend.begin_frame(self.clear_color);

        let mut stats = FrameStats::default();
        {
            let mut encoder =
                DrawEncoder::new(&mut *backend, &mut self.programs, &mut self.textures, *camera);
            traverse(scene, |unit| stats.record(encoder.encode(unit)));
        }

        backend.end_frame();
        log::trace!("frame rendered: {stats:?}");
        Ok(stats)
    }

    /// CPU copy of the last rendered frame, top row first.
    ///
    /// `None` (with a warning) before the first render or after disposal.
    pub fn image(&mut self) -> Option<Rc<RgbaImage>> {
        self.surface.image()
    }

    /// Renders `scene` and hands the result to `painter` at logical size.
    pub fn render_and_paint(
        &mut self,
        camera: &CameraTransforms,
        scene: &Shape,
        painter: &mut dyn Painter,
    ) -> Result<FrameStats> {
        let stats = self.render(camera, scene)?;
        let logical = self.logical_size();
        match self.image() {
            Some(image) => painter.draw_image(&image, logical.width, logical.height),
            None => log::error!("rendered frame produced no image"),
        }
        Ok(stats)
    }

    /// Resizes the surface in logical pixels; no-op if unchanged.
    pub fn resize(&mut self, logical_width: f64, logical_height: f64) {
        self.surface.resize(LogicalSize::new(logical_width, logical_height));
    }

    /// Releases every program, shader stage and texture, then the surface.
    ///
    /// Safe to call more than once. A later render starts over with a new
    /// surface and empty caches.
    pub fn dispose(&mut self) {
        drop(self.release());
    }

    fn release(&mut self) -> Option<B> {
        let programs = &mut self.programs;
        let textures = &mut self.textures;
        self.surface.dispose(|backend| {
            programs.release_all(backend);
            textures.release_all(backend);
        })
    }
}

impl<B: GpuBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
