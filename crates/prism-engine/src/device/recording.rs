//! In-memory backend that records every call, for tests that need no GPU.

use std::collections::HashSet;

use anyhow::{Result, bail};
use image::{Rgba, RgbaImage};
use winit::dpi::PhysicalSize;

use crate::program::{ShaderStage, VariantKey};

use super::backend::{Compiled, DrawCall, GpuBackend, Origin, Primitives, SceneUniforms};

#[derive(Debug)]
pub struct RecordedShader {
    pub id: u32,
    pub ok: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RecordedProgram {
    pub id: u32,
    pub variant: VariantKey,
    pub ok: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RecordedTexture {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    /// Red channel of the first pixel, to tell flipped uploads apart.
    pub first_red: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStream {
    pub location: u32,
    pub components: u32,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedPrimitives {
    Indexed(Vec<u32>),
    Arrays(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: u32,
    pub variant: VariantKey,
    pub cull_back_faces: bool,
    pub uniforms: SceneUniforms,
    pub streams: Vec<RecordedStream>,
    pub texture: Option<u32>,
    pub primitives: RecordedPrimitives,
}

impl DrawRecord {
    pub fn stream(&self, location: u32) -> Option<&RecordedStream> {
        self.streams.iter().find(|s| s.location == location)
    }
}

pub struct RecordingBackend {
    size: PhysicalSize<u32>,
    origin: Origin,
    next_id: u32,
    cull_back_faces: bool,
    in_frame: bool,

    compiles: Vec<ShaderStage>,
    links: usize,
    location_lookups: std::cell::Cell<usize>,
    detaches: usize,
    live_shaders: HashSet<u32>,
    live_programs: HashSet<u32>,
    live_textures: HashSet<u32>,
    uploads: Vec<u32>,

    frames: Vec<[f64; 4]>,
    draws: Vec<DrawRecord>,
    reads: usize,
    resizes: Vec<PhysicalSize<u32>>,
    fail_reads: bool,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: PhysicalSize::new(width, height),
            origin: Origin::TopLeft,
            next_id: 1,
            cull_back_faces: true,
            in_frame: false,
            compiles: Vec::new(),
            links: 0,
            location_lookups: std::cell::Cell::new(0),
            detaches: 0,
            live_shaders: HashSet::new(),
            live_programs: HashSet::new(),
            live_textures: HashSet::new(),
            uploads: Vec::new(),
            frames: Vec::new(),
            draws: Vec::new(),
            reads: 0,
            resizes: Vec::new(),
            fail_reads: false,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ── inspection ────────────────────────────────────────────────────────

    pub fn compiles(&self, stage: ShaderStage) -> usize {
        self.compiles.iter().filter(|&&s| s == stage).count()
    }

    pub fn links(&self) -> usize {
        self.links
    }

    pub fn location_lookups(&self) -> usize {
        self.location_lookups.get()
    }

    pub fn detaches(&self) -> usize {
        self.detaches
    }

    pub fn live_shaders(&self) -> usize {
        self.live_shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.live_programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.len()
    }

    /// Ids of uploaded textures, in upload order.
    pub fn uploads(&self) -> &[u32] {
        &self.uploads
    }

    /// Clear colors of every begun frame.
    pub fn frames(&self) -> &[[f64; 4]] {
        &self.frames
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn resizes(&self) -> &[PhysicalSize<u32>] {
        &self.resizes
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }
}

impl GpuBackend for RecordingBackend {
    type Shader = RecordedShader;
    type Program = RecordedProgram;
    type Texture = RecordedTexture;

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
        self.resizes.push(size);
    }

    fn framebuffer_origin(&self) -> Origin {
        self.origin
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        _variant: VariantKey,
        source: &str,
    ) -> Compiled<RecordedShader> {
        let id = self.next_id();
        self.compiles.push(stage);
        self.live_shaders.insert(id);

        let entry = match stage {
            ShaderStage::Vertex => "fn vs_main",
            ShaderStage::Fragment => "fn fs_main",
        };
        if source.contains(entry) {
            Compiled::ok(RecordedShader { id, ok: true })
        } else {
            Compiled::failed(
                RecordedShader { id, ok: false },
                format!("missing entry point `{entry}`"),
            )
        }
    }

    fn link_program(
        &mut self,
        variant: VariantKey,
        vertex: &RecordedShader,
        fragment: &RecordedShader,
    ) -> Compiled<RecordedProgram> {
        let id = self.next_id();
        self.links += 1;
        self.live_programs.insert(id);

        let ok = vertex.ok && fragment.ok;
        let program = RecordedProgram { id, variant, ok };
        if ok {
            Compiled::ok(program)
        } else {
            Compiled::failed(program, "attached stage did not compile")
        }
    }

    fn attribute_location(&self, program: &RecordedProgram, name: &str) -> Option<u32> {
        self.location_lookups.set(self.location_lookups.get() + 1);
        program.variant.attribute_location(name)
    }

    fn delete_program(
        &mut self,
        program: RecordedProgram,
        _vertex: &RecordedShader,
        _fragment: &RecordedShader,
    ) {
        self.detaches += 2;
        self.live_programs.remove(&program.id);
    }

    fn delete_shader(&mut self, shader: RecordedShader) {
        self.live_shaders.remove(&shader.id);
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> RecordedTexture {
        let id = self.next_id();
        self.live_textures.insert(id);
        self.uploads.push(id);
        RecordedTexture {
            id,
            width: image.width(),
            height: image.height(),
            first_red: image.get_pixel_checked(0, 0).map_or(0, |p| p[0]),
        }
    }

    fn delete_texture(&mut self, texture: RecordedTexture) {
        self.live_textures.remove(&texture.id);
    }

    fn begin_frame(&mut self, clear: [f64; 4]) {
        self.in_frame = true;
        self.frames.push(clear);
    }

    fn cull_back_faces(&self) -> bool {
        self.cull_back_faces
    }

    fn set_cull_back_faces(&mut self, enabled: bool) {
        self.cull_back_faces = enabled;
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) {
        let primitives = match call.primitives {
            Primitives::Indexed(indices) => RecordedPrimitives::Indexed(indices.to_vec()),
            Primitives::Arrays { vertex_count } => RecordedPrimitives::Arrays(vertex_count),
        };
        self.draws.push(DrawRecord {
            program: call.program.id,
            variant: call.program.variant,
            cull_back_faces: self.cull_back_faces,
            uniforms: call.uniforms,
            streams: call
                .streams
                .iter()
                .map(|s| RecordedStream {
                    location: s.location,
                    components: s.components,
                    data: s.data.to_vec(),
                })
                .collect(),
            texture: call.texture.map(|t| t.id),
            primitives,
        });
    }

    fn end_frame(&mut self) {
        self.in_frame = false;
    }

    /// Row `y` is filled with red `y`, so row order is observable.
    fn read_pixels(&mut self) -> Result<RgbaImage> {
        self.reads += 1;
        if self.fail_reads {
            bail!("readback failed");
        }
        Ok(RgbaImage::from_fn(self.size.width, self.size.height, |_, y| {
            Rgba([y as u8, 0, 0, 255])
        }))
    }
}
