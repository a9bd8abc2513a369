use std::fmt;
use std::rc::Rc;

use super::TextureImage;

/// Straight RGB fill color, components in `[0, 1]`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Fallback used when a unit carries no color source at all.
    pub const RED: Self = Self::new(1.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    #[inline]
    pub const fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// One batch of triangle geometry owned by a leaf shape.
///
/// Units form a singly-linked chain through `next`; a leaf renders the whole
/// chain in link order.
///
/// Layout:
/// - `positions`: 3 floats per vertex
/// - `colors`: 3 floats per vertex (optional)
/// - `tex_coords`: 2 floats per vertex, bottom-left origin (optional)
/// - `indices`: triangle list into `positions` (optional)
#[derive(Debug, Clone, Default)]
pub struct DrawableUnit {
    pub positions: Vec<f32>,
    pub colors: Option<Vec<f32>>,
    pub tex_coords: Option<Vec<f32>>,
    pub indices: Option<Vec<u32>>,
    /// Uniform fill used when `colors` is absent.
    pub color: Option<Color>,
    pub texture: Option<Rc<TextureImage>>,
    /// Disables back-face culling while this unit is drawn.
    pub double_sided: bool,
    pub next: Option<Box<DrawableUnit>>,
}

impl DrawableUnit {
    pub fn new(positions: Vec<f32>) -> Self {
        Self {
            positions,
            colors: None,
            tex_coords: None,
            indices: None,
            color: None,
            texture: None,
            double_sided: false,
            next: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_colors(mut self, colors: Vec<f32>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn with_tex_coords(mut self, tex_coords: Vec<f32>) -> Self {
        self.tex_coords = Some(tex_coords);
        self
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_texture(mut self, texture: Rc<TextureImage>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    /// Appends `unit` (and its own chain) at the end of this chain.
    pub fn with_next(mut self, unit: DrawableUnit) -> Self {
        self.push_back(unit);
        self
    }

    pub fn push_back(&mut self, unit: DrawableUnit) {
        let mut tail = &mut self.next;
        while let Some(node) = tail {
            tail = &mut node.next;
        }
        *tail = Some(Box::new(unit));
    }

    /// Iterates this unit and every unit linked after it.
    pub fn chain(&self) -> Chain<'_> {
        Chain { cursor: Some(self) }
    }

    /// Number of vertices described by `positions` (floats / 3).
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        (self.positions.len() / 3) as u32
    }

    #[inline]
    pub fn has_color_array(&self) -> bool {
        self.colors.as_ref().is_some_and(|c| !c.is_empty())
    }

    #[inline]
    pub fn has_tex_coords(&self) -> bool {
        self.tex_coords.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// Color array, if one is set and non-empty.
    pub fn color_array(&self) -> Option<&[f32]> {
        self.colors.as_deref().filter(|c| !c.is_empty())
    }

    /// Texture coordinates, if set and non-empty.
    pub fn tex_coord_array(&self) -> Option<&[f32]> {
        self.tex_coords.as_deref().filter(|t| !t.is_empty())
    }

    /// Number of vertices a draw of this unit reads: one past the highest
    /// index when indexed, otherwise [`vertex_count`](Self::vertex_count).
    pub fn referenced_vertices(&self) -> u32 {
        match &self.indices {
            Some(indices) => indices.iter().max().map_or(0, |&i| i.saturating_add(1)),
            None => self.vertex_count(),
        }
    }

    /// Checks the structural invariants of this unit only (not the chain).
    pub fn validate(&self) -> Result<(), InvalidUnit> {
        if self.positions.len() % 3 != 0 {
            return Err(InvalidUnit::RaggedPositions {
                len: self.positions.len(),
            });
        }
        if !self.has_color_array() && self.color.is_none() {
            return Err(InvalidUnit::MissingColorSource);
        }
        self.check_indices()?;
        if let Some(colors) = self.color_array() {
            self.check_stream("colors", colors, 3)?;
        }
        if let Some(tex_coords) = self.tex_coord_array() {
            self.check_stream("tex_coords", tex_coords, 2)?;
        }
        Ok(())
    }

    /// Fails if any index points past the last vertex.
    pub fn check_indices(&self) -> Result<(), InvalidUnit> {
        let Some(indices) = &self.indices else {
            return Ok(());
        };
        let vertex_count = self.vertex_count();
        match indices.iter().find(|&&i| i >= vertex_count) {
            Some(&index) => Err(InvalidUnit::IndexOutOfRange {
                index,
                vertex_count,
            }),
            None => Ok(()),
        }
    }

    /// Fails if `data`, read `components` floats per vertex, ends before the
    /// last vertex a draw of this unit reads.
    pub fn check_stream(
        &self,
        stream: &'static str,
        data: &[f32],
        components: usize,
    ) -> Result<(), InvalidUnit> {
        let vertices = (data.len() / components) as u32;
        let needed = self.referenced_vertices();
        if vertices < needed {
            return Err(InvalidUnit::ShortStream {
                stream,
                vertices,
                needed,
            });
        }
        Ok(())
    }
}

// Unlinks the chain one node at a time so long chains drop without recursion.
impl Drop for DrawableUnit {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut unit) = next {
            next = unit.next.take();
        }
    }
}

/// Iterator over a unit chain, in link order.
pub struct Chain<'a> {
    cursor: Option<&'a DrawableUnit>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a DrawableUnit;

    fn next(&mut self) -> Option<Self::Item> {
        let unit = self.cursor?;
        self.cursor = unit.next.as_deref();
        Some(unit)
    }
}

/// Structural problem found by [`DrawableUnit::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidUnit {
    /// Position array length is not a multiple of 3.
    RaggedPositions { len: usize },
    /// Neither a color array nor a uniform color is present.
    MissingColorSource,
    /// An index points past the last vertex.
    IndexOutOfRange { index: u32, vertex_count: u32 },
    /// A per-vertex stream has fewer entries than the draw reads.
    ShortStream {
        stream: &'static str,
        vertices: u32,
        needed: u32,
    },
}

impl fmt::Display for InvalidUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaggedPositions { len } => {
                write!(f, "position array length {len} is not a multiple of 3")
            }
            Self::MissingColorSource => write!(f, "no color array and no uniform color"),
            Self::IndexOutOfRange {
                index,
                vertex_count,
            } => write!(f, "index {index} out of range for {vertex_count} vertices"),
            Self::ShortStream {
                stream,
                vertices,
                needed,
            } => write!(f, "{stream} covers {vertices} vertices but the draw reads {needed}"),
        }
    }
}

impl std::error::Error for InvalidUnit {}
