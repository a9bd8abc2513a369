/// Initialization parameters for the offscreen GPU layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Adapter selection hint.
    pub power_preference: wgpu::PowerPreference,

    /// Forces a software adapter (useful on headless CI).
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// MSAA sample count of the color and depth targets.
    ///
    /// `1` disables multisampling. Unsupported counts fail surface creation.
    pub sample_count: u32,

    /// Color the framebuffer is cleared to at the start of each render
    /// (straight RGBA, `[0, 1]`).
    pub clear_color: [f64; 4],
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            sample_count: 4,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}
