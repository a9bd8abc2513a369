use crate::device::{DrawCall, GpuBackend, Primitives, SceneUniforms, VertexStream};
use crate::program::{ProgramCache, VariantKey, select_variant};
use crate::scene::{CameraTransforms, Color, DrawableUnit, InvalidUnit};

use super::TextureCache;

/// Outcome of encoding one unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Encoded {
    Indexed,
    Arrays,
    /// Nothing was submitted (empty geometry, invalid indices or a vertex
    /// stream shorter than the draw).
    Skipped,
}

/// Issues the draw for one drawable unit at a time.
///
/// Borrows the renderer's caches and the current backend for the duration
/// of one render. All per-draw state lives in the `DrawCall` built inside
/// [`encode`](Self::encode); nothing carries over between units except the
/// cull state, which is restored after each double-sided unit.
pub struct DrawEncoder<'a, B: GpuBackend> {
    backend: &'a mut B,
    programs: &'a mut ProgramCache<B>,
    textures: &'a mut TextureCache<B>,
    camera: CameraTransforms,
}

impl<'a, B: GpuBackend> DrawEncoder<'a, B> {
    pub fn new(
        backend: &'a mut B,
        programs: &'a mut ProgramCache<B>,
        textures: &'a mut TextureCache<B>,
        camera: CameraTransforms,
    ) -> Self {
        Self {
            backend,
            programs,
            textures,
            camera,
        }
    }

    pub fn encode(&mut self, unit: &DrawableUnit) -> Encoded {
        if unit.positions.is_empty() {
            log::debug!("skipping unit without positions");
            return Encoded::Skipped;
        }
        if log::log_enabled!(log::Level::Debug) {
            if let Err(e) = unit.validate() {
                log::debug!("unit does not validate: {e}");
            }
        }
        if let Err(e) = unit.check_indices() {
            log::warn!("skipping unit: {e}");
            return Encoded::Skipped;
        }

        let variant = select_variant(unit);
        if let Err(e) = check_bound_streams(unit, variant) {
            log::warn!("skipping unit: {e}");
            return Encoded::Skipped;
        }

        let restore_cull = unit.double_sided && self.backend.cull_back_faces();
        if restore_cull {
            self.backend.set_cull_back_faces(false);
        }

        let encoded = self.draw(unit, variant);

        if restore_cull {
            self.backend.set_cull_back_faces(true);
        }
        encoded
    }

    fn draw(&mut self, unit: &DrawableUnit, variant: VariantKey) -> Encoded {
        let program = self.programs.get_or_create(self.backend, variant);
        let slots = program.attribute_slots(self.backend);

        let mut streams: Vec<VertexStream<'_>> = Vec::with_capacity(2);
        if let Some(location) = slots.position {
            streams.push(VertexStream {
                location,
                components: 3,
                data: &unit.positions,
            });
        }

        let color = match (unit.color, unit.color_array()) {
            (Some(color), _) => color,
            (None, Some(_)) => Color::WHITE,
            (None, None) => {
                log::warn!("unit has neither a color array nor a uniform color; using red");
                Color::RED
            }
        };
        if let (Some(location), Some(colors)) = (slots.color, unit.color_array()) {
            streams.push(VertexStream {
                location,
                components: 3,
                data: colors,
            });
        }

        let texture = if variant.is_textured() {
            if let (Some(location), Some(tex_coords)) = (slots.tex_coord, unit.tex_coord_array()) {
                streams.push(VertexStream {
                    location,
                    components: 2,
                    data: tex_coords,
                });
            }
            match &unit.texture {
                Some(image) => Some(self.textures.get_or_upload(self.backend, image)),
                None => {
                    log::warn!("textured unit has no texture; sampling white");
                    None
                }
            }
        } else {
            None
        };

        let (primitives, encoded) = match &unit.indices {
            Some(indices) => (Primitives::Indexed(indices), Encoded::Indexed),
            None => (
                Primitives::Arrays {
                    vertex_count: unit.vertex_count(),
                },
                Encoded::Arrays,
            ),
        };

        let [r, g, b] = color.to_array();
        let call = DrawCall {
            program: program.handle(),
            uniforms: SceneUniforms {
                projection: self.camera.projection,
                view: self.camera.view,
                color: [r, g, b, 1.0],
            },
            streams: &streams,
            texture,
            primitives,
        };
        self.backend.draw(&call);
        encoded
    }
}

/// Fails if a stream `variant` binds ends before the last vertex drawn.
fn check_bound_streams(unit: &DrawableUnit, variant: VariantKey) -> Result<(), InvalidUnit> {
    match variant {
        VariantKey::PositionColor => Ok(()),
        VariantKey::PositionColorArray => unit
            .color_array()
            .map_or(Ok(()), |colors| unit.check_stream("colors", colors, 3)),
        VariantKey::PositionColorTexture => unit
            .tex_coord_array()
            .map_or(Ok(()), |tex_coords| unit.check_stream("tex_coords", tex_coords, 2)),
    }
}
