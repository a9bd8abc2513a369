use std::borrow::Cow;
use std::collections::HashMap;

use super::VariantKey;

/// Pipeline stage of a shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

/// WGSL sources used to build programs.
///
/// Vertex stages differ per variant; one general fragment stage serves all
/// variants. Defaults are embedded at build time. Overrides allow editing a
/// stage while the render loop keeps running.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    vertex: HashMap<VariantKey, Cow<'static, str>>,
    fragment: Cow<'static, str>,
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        let vertex = HashMap::from([
            (
                VariantKey::PositionColor,
                Cow::Borrowed(include_str!("shaders/position_color.wgsl")),
            ),
            (
                VariantKey::PositionColorArray,
                Cow::Borrowed(include_str!("shaders/position_color_array.wgsl")),
            ),
            (
                VariantKey::PositionColorTexture,
                Cow::Borrowed(include_str!("shaders/position_color_texture.wgsl")),
            ),
        ]);

        Self {
            vertex,
            fragment: Cow::Borrowed(include_str!("shaders/general.wgsl")),
        }
    }
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertex_source(
        mut self,
        variant: VariantKey,
        source: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.vertex.insert(variant, source.into());
        self
    }

    pub fn with_fragment_source(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.fragment = source.into();
        self
    }

    pub fn vertex_source(&self, variant: VariantKey) -> &str {
        // Every variant is populated by `Default` and overrides only replace.
        self.vertex.get(&variant).map_or("", |s| s.as_ref())
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment
    }

    pub fn source(&self, stage: ShaderStage, variant: VariantKey) -> &str {
        match stage {
            ShaderStage::Vertex => self.vertex_source(variant),
            ShaderStage::Fragment => self.fragment_source(),
        }
    }
}
