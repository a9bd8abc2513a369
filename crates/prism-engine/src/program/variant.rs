use crate::scene::DrawableUnit;

/// Vertex attribute names shared by every vertex stage.
pub const POSITION_ATTRIBUTE: &str = "vert_point";
pub const COLOR_ATTRIBUTE: &str = "vert_color";
pub const TEX_COORD_ATTRIBUTE: &str = "vert_tex_coord";

/// Program variant selected from a unit's attribute presence.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum VariantKey {
    /// Positions + one uniform color.
    PositionColor,
    /// Positions + per-vertex colors.
    PositionColorArray,
    /// Positions + texture coordinates (+ bound texture).
    PositionColorTexture,
}

impl VariantKey {
    pub const ALL: [Self; 3] = [
        Self::PositionColor,
        Self::PositionColorArray,
        Self::PositionColorTexture,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::PositionColor => "position_color",
            Self::PositionColorArray => "position_color_array",
            Self::PositionColorTexture => "position_color_texture",
        }
    }

    #[inline]
    pub const fn is_textured(self) -> bool {
        matches!(self, Self::PositionColorTexture)
    }

    /// Shader location of `name` in this variant's vertex stage.
    ///
    /// `None` means the stage does not declare the attribute; streams for it
    /// are not bound.
    pub fn attribute_location(self, name: &str) -> Option<u32> {
        match (self, name) {
            (_, POSITION_ATTRIBUTE) => Some(0),
            (Self::PositionColorArray, COLOR_ATTRIBUTE) => Some(1),
            (Self::PositionColorTexture, TEX_COORD_ATTRIBUTE) => Some(2),
            _ => None,
        }
    }

    /// Locations declared by the vertex stage, in vertex-buffer slot order.
    pub const fn vertex_locations(self) -> &'static [u32] {
        match self {
            Self::PositionColor => &[0],
            Self::PositionColorArray => &[0, 1],
            Self::PositionColorTexture => &[0, 2],
        }
    }
}

/// Maps a unit to the program variant that can draw it.
///
/// Texture coordinates win over a color array; a color array wins over the
/// uniform color.
pub fn select_variant(unit: &DrawableUnit) -> VariantKey {
    if unit.has_tex_coords() {
        VariantKey::PositionColorTexture
    } else if unit.has_color_array() {
        VariantKey::PositionColorArray
    } else {
        VariantKey::PositionColor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Color;

    fn unit(colors: bool, tex_coords: bool) -> DrawableUnit {
        let mut unit = DrawableUnit::new(vec![0.0; 9]).with_color(Color::WHITE);
        if colors {
            unit = unit.with_colors(vec![1.0; 9]);
        }
        if tex_coords {
            unit = unit.with_tex_coords(vec![0.0; 6]);
        }
        unit
    }

    #[test]
    fn tie_break_over_all_combinations() {
        let expected = [
            ((false, false), VariantKey::PositionColor),
            ((true, false), VariantKey::PositionColorArray),
            ((false, true), VariantKey::PositionColorTexture),
            ((true, true), VariantKey::PositionColorTexture),
        ];
        for ((colors, tex), key) in expected {
            assert_eq!(select_variant(&unit(colors, tex)), key, "colors={colors} tex={tex}");
            // Same input, same answer.
            assert_eq!(select_variant(&unit(colors, tex)), key);
        }
    }

    #[test]
    fn empty_tex_coords_do_not_select_texture_variant() {
        let unit = unit(true, false).with_tex_coords(Vec::new());
        assert_eq!(select_variant(&unit), VariantKey::PositionColorArray);
    }

    #[test]
    fn texture_without_coords_is_not_textured() {
        let image = std::rc::Rc::new(
            crate::scene::TextureImage::from_rgba8(1, 1, vec![0; 4]).unwrap(),
        );
        let unit = unit(false, false).with_texture(image);
        assert_eq!(select_variant(&unit), VariantKey::PositionColor);
    }

    #[test]
    fn locations_match_vertex_layouts() {
        for key in VariantKey::ALL {
            let declared: Vec<u32> = [POSITION_ATTRIBUTE, COLOR_ATTRIBUTE, TEX_COORD_ATTRIBUTE]
                .iter()
                .filter_map(|name| key.attribute_location(name))
                .collect();
            assert_eq!(declared, key.vertex_locations(), "{}", key.label());
        }
    }
}
