/// Camera matrices supplied by the scene graph for one render.
///
/// Both matrices are 4×4, column-major, with clip-space depth in `[-1, 1]`.
/// They are consumed as-is; nothing here computes or caches them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraTransforms {
    /// Camera space to clip space.
    pub projection: [f32; 16],
    /// Scene space to camera space.
    pub view: [f32; 16],
}

impl CameraTransforms {
    pub const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    #[inline]
    pub const fn new(projection: [f32; 16], view: [f32; 16]) -> Self {
        Self { projection, view }
    }

    /// Converts double-precision matrices as handed out by most scene graphs.
    pub fn from_f64(projection: &[f64; 16], view: &[f64; 16]) -> Self {
        Self {
            projection: projection.map(|v| v as f32),
            view: view.map(|v| v as f32),
        }
    }
}

impl Default for CameraTransforms {
    fn default() -> Self {
        Self::new(Self::IDENTITY, Self::IDENTITY)
    }
}
