use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use winit::dpi::PhysicalSize;

use crate::program::{ShaderStage, VariantKey};

/// Row origin of the GPU framebuffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Origin {
    /// Row 0 is the top row (wgpu, images).
    TopLeft,
    /// Row 0 is the bottom row (OpenGL).
    BottomLeft,
}

/// Result of a GPU build step that may carry a diagnostic.
///
/// The handle is always returned; a failed step yields a handle that is
/// usable but may render incorrectly.
#[derive(Debug, Clone)]
pub struct Compiled<T> {
    pub handle: T,
    pub diagnostic: Option<String>,
}

impl<T> Compiled<T> {
    pub fn ok(handle: T) -> Self {
        Self {
            handle,
            diagnostic: None,
        }
    }

    pub fn failed(handle: T, diagnostic: impl Into<String>) -> Self {
        Self {
            handle,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Per-draw uniform block shared by every vertex stage.
///
/// Matrices are column-major. `color` is the uniform fill (alpha unused).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub projection: [f32; 16],
    pub view: [f32; 16],
    pub color: [f32; 4],
}

/// One float attribute stream bound to a shader location.
#[derive(Debug, Copy, Clone)]
pub struct VertexStream<'a> {
    pub location: u32,
    /// Floats per vertex (2 or 3).
    pub components: u32,
    pub data: &'a [f32],
}

/// How the triangles of a draw are assembled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Primitives<'a> {
    /// Triangle list over an index buffer.
    Indexed(&'a [u32]),
    /// Triangle list over the first `vertex_count` vertices.
    Arrays { vertex_count: u32 },
}

/// Everything a backend needs for one draw.
///
/// Built by the draw encoder for a single unit and dropped right after the
/// draw; nothing in it outlives the call.
pub struct DrawCall<'a, B: GpuBackend + ?Sized> {
    pub program: &'a B::Program,
    pub uniforms: SceneUniforms,
    pub streams: &'a [VertexStream<'a>],
    /// Texture bound to unit 0, if the program samples one.
    pub texture: Option<&'a B::Texture>,
    pub primitives: Primitives<'a>,
}

/// GPU operations the renderer core relies on.
///
/// An implementation is one drawing surface plus the context that owns it.
/// Holding `&mut` to it is what "the context is current" means: every call
/// here assumes it.
pub trait GpuBackend {
    type Shader;
    type Program;
    type Texture;

    /// Framebuffer size in device pixels.
    fn size(&self) -> PhysicalSize<u32>;

    fn resize(&mut self, size: PhysicalSize<u32>);

    fn framebuffer_origin(&self) -> Origin;

    // ── programs ──────────────────────────────────────────────────────────

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        variant: VariantKey,
        source: &str,
    ) -> Compiled<Self::Shader>;

    fn link_program(
        &mut self,
        variant: VariantKey,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    ) -> Compiled<Self::Program>;

    fn attribute_location(&self, program: &Self::Program, name: &str) -> Option<u32>;

    /// Detaches both stages from `program` and deletes it.
    fn delete_program(
        &mut self,
        program: Self::Program,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    );

    fn delete_shader(&mut self, shader: Self::Shader);

    // ── textures ──────────────────────────────────────────────────────────

    /// Uploads rows as given; callers handle origin flipping.
    fn upload_texture(&mut self, image: &RgbaImage) -> Self::Texture;

    fn delete_texture(&mut self, texture: Self::Texture);

    // ── frame ─────────────────────────────────────────────────────────────

    /// Starts a frame: full viewport, color cleared to `clear`, depth to 1.
    fn begin_frame(&mut self, clear: [f64; 4]);

    fn cull_back_faces(&self) -> bool;

    fn set_cull_back_faces(&mut self, enabled: bool);

    fn draw(&mut self, call: &DrawCall<'_, Self>);

    /// Submits the frame's work.
    fn end_frame(&mut self);

    /// Reads the whole framebuffer, rows in [`framebuffer_origin`](Self::framebuffer_origin) order.
    fn read_pixels(&mut self) -> Result<RgbaImage>;
}
