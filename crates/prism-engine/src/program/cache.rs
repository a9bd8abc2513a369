use std::cell::OnceCell;
use std::collections::HashMap;

use crate::device::GpuBackend;

use super::{
    COLOR_ATTRIBUTE, POSITION_ATTRIBUTE, ProgramDiagnostic, ShaderLibrary, ShaderStage,
    TEX_COORD_ATTRIBUTE, VariantKey,
};

/// Attribute locations of one linked program.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AttributeSlots {
    pub position: Option<u32>,
    pub color: Option<u32>,
    pub tex_coord: Option<u32>,
}

/// A linked program for one variant.
///
/// Attribute locations are resolved on first use and then memoized on this
/// instance, which is why the cache must never build two programs for the
/// same variant. The cache owns every program; callers only borrow them, so
/// [`ProgramCache::release_all`] can always delete the GPU handles.
pub struct CompiledProgram<B: GpuBackend> {
    variant: VariantKey,
    program: B::Program,
    vertex: B::Shader,
    diagnostics: Vec<ProgramDiagnostic>,
    slots: OnceCell<AttributeSlots>,
}

impl<B: GpuBackend> CompiledProgram<B> {
    #[inline]
    pub fn variant(&self) -> VariantKey {
        self.variant
    }

    #[inline]
    pub fn handle(&self) -> &B::Program {
        &self.program
    }

    /// Compile/link problems recorded when this program was built.
    pub fn diagnostics(&self) -> &[ProgramDiagnostic] {
        &self.diagnostics
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Attribute locations, looked up from `backend` on first call only.
    pub fn attribute_slots(&self, backend: &B) -> AttributeSlots {
        *self.slots.get_or_init(|| AttributeSlots {
            position: backend.attribute_location(&self.program, POSITION_ATTRIBUTE),
            color: backend.attribute_location(&self.program, COLOR_ATTRIBUTE),
            tex_coord: backend.attribute_location(&self.program, TEX_COORD_ATTRIBUTE),
        })
    }
}

/// Owns the compiled programs of one renderer, at most one per variant.
///
/// The general fragment stage is compiled once and shared by all programs.
pub struct ProgramCache<B: GpuBackend> {
    library: ShaderLibrary,
    programs: HashMap<VariantKey, CompiledProgram<B>>,
    fragment: Option<B::Shader>,
}

impl<B: GpuBackend> ProgramCache<B> {
    pub fn new(library: ShaderLibrary) -> Self {
        Self {
            library,
            programs: HashMap::new(),
            fragment: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn get(&self, variant: VariantKey) -> Option<&CompiledProgram<B>> {
        self.programs.get(&variant)
    }

    /// Returns the program for `variant`, building it on first request.
    ///
    /// Build failures are logged and recorded on the program; a broken
    /// program is still returned and cached.
    pub fn get_or_create(&mut self, backend: &mut B, variant: VariantKey) -> &CompiledProgram<B> {
        let Self {
            library,
            programs,
            fragment,
        } = self;
        programs
            .entry(variant)
            .or_insert_with(|| build_program(backend, library, fragment, variant))
    }

    /// Detaches and deletes every program, then every shader stage.
    pub fn release_all(&mut self, backend: &mut B) {
        let Some(fragment) = self.fragment.take() else {
            debug_assert!(self.programs.is_empty());
            return;
        };
        for (_, program) in self.programs.drain() {
            let CompiledProgram {
                program, vertex, ..
            } = program;
            backend.delete_program(program, &vertex, &fragment);
            backend.delete_shader(vertex);
        }
        backend.delete_shader(fragment);
    }
}

/// Compiles the vertex stage for `variant` (and the shared fragment stage on
/// first use), then links them.
fn build_program<B: GpuBackend>(
    backend: &mut B,
    library: &ShaderLibrary,
    shared_fragment: &mut Option<B::Shader>,
    variant: VariantKey,
) -> CompiledProgram<B> {
    log::debug!("building program {}", variant.label());
    let mut diagnostics = Vec::new();

    let fragment = shared_fragment.get_or_insert_with(|| {
        let compiled =
            backend.compile_shader(ShaderStage::Fragment, variant, library.fragment_source());
        if let Some(log) = compiled.diagnostic {
            diagnostics.push(ProgramDiagnostic::Compile {
                variant,
                stage: ShaderStage::Fragment,
                log,
            });
        }
        compiled.handle
    });

    let vertex = backend.compile_shader(ShaderStage::Vertex, variant, library.vertex_source(variant));
    if let Some(log) = vertex.diagnostic {
        diagnostics.push(ProgramDiagnostic::Compile {
            variant,
            stage: ShaderStage::Vertex,
            log,
        });
    }

    let linked = backend.link_program(variant, &vertex.handle, fragment);
    if let Some(log) = linked.diagnostic {
        diagnostics.push(ProgramDiagnostic::Link { variant, log });
    }

    for diagnostic in &diagnostics {
        log::error!("{diagnostic}");
    }

    CompiledProgram {
        variant,
        program: linked.handle,
        vertex: vertex.handle,
        diagnostics,
        slots: OnceCell::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingBackend;

    type Program = CompiledProgram<RecordingBackend>;

    fn cache() -> ProgramCache<RecordingBackend> {
        ProgramCache::new(ShaderLibrary::default())
    }

    #[test]
    fn same_key_returns_same_instance() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut cache = cache();

        let a: *const Program = cache.get_or_create(&mut backend, VariantKey::PositionColor);
        let b: *const Program = cache.get_or_create(&mut backend, VariantKey::PositionColor);

        assert!(std::ptr::eq(a, b));
        assert_eq!(cache.len(), 1);
        assert_eq!(backend.links(), 1);
    }

    #[test]
    fn different_keys_return_different_instances() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut cache = cache();

        for key in VariantKey::ALL {
            cache.get_or_create(&mut backend, key);
        }

        let programs: Vec<&Program> = VariantKey::ALL
            .iter()
            .map(|&key| cache.get(key).unwrap())
            .collect();
        for (i, a) in programs.iter().enumerate() {
            assert_eq!(a.variant(), VariantKey::ALL[i]);
            for b in &programs[i + 1..] {
                assert!(!std::ptr::eq(*a, *b));
                assert_ne!(a.handle(), b.handle());
            }
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn fragment_stage_is_compiled_once() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut cache = cache();
        for key in VariantKey::ALL {
            cache.get_or_create(&mut backend, key);
        }

        // Three vertex stages plus one shared fragment stage.
        assert_eq!(backend.compiles(ShaderStage::Vertex), 3);
        assert_eq!(backend.compiles(ShaderStage::Fragment), 1);
    }

    #[test]
    fn attribute_slots_are_resolved_once() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut cache = cache();
        let program = cache.get_or_create(&mut backend, VariantKey::PositionColorTexture);

        let first = program.attribute_slots(&backend);
        let second = program.attribute_slots(&backend);

        assert_eq!(first, second);
        assert_eq!(first.position, Some(0));
        assert_eq!(first.color, None);
        assert_eq!(first.tex_coord, Some(2));
        // One lookup per attribute name, not per call.
        assert_eq!(backend.location_lookups(), 3);
    }

    #[test]
    fn compile_failure_still_returns_cached_program() {
        let mut backend = RecordingBackend::new(64, 64);
        let library = ShaderLibrary::default()
            .with_vertex_source(VariantKey::PositionColor, "fn broken(");
        let mut cache = ProgramCache::new(library);

        let a: *const Program = cache.get_or_create(&mut backend, VariantKey::PositionColor);
        let b = cache.get_or_create(&mut backend, VariantKey::PositionColor);

        assert!(std::ptr::eq(a, b));
        assert!(!b.is_clean());
        assert!(matches!(
            b.diagnostics()[0],
            ProgramDiagnostic::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert!(matches!(b.diagnostics().last(), Some(ProgramDiagnostic::Link { .. })));

        // Other variants are unaffected.
        let c = cache.get_or_create(&mut backend, VariantKey::PositionColorArray);
        assert!(c.is_clean());
    }

    #[test]
    fn release_all_deletes_every_handle() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut cache = cache();
        for key in VariantKey::ALL {
            cache.get_or_create(&mut backend, key);
        }
        assert_eq!(backend.live_programs(), 3);
        assert_eq!(backend.live_shaders(), 4);

        cache.release_all(&mut backend);

        assert!(cache.is_empty());
        assert_eq!(backend.live_programs(), 0);
        assert_eq!(backend.live_shaders(), 0);
        assert_eq!(backend.detaches(), 6);
    }

    #[test]
    fn release_all_frees_programs_that_were_handed_out() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut cache = cache();
        let handle = cache
            .get_or_create(&mut backend, VariantKey::PositionColor)
            .handle()
            .id;
        assert_eq!(cache.get(VariantKey::PositionColor).unwrap().handle().id, handle);

        cache.release_all(&mut backend);

        assert!(cache.get(VariantKey::PositionColor).is_none());
        assert_eq!(backend.live_programs(), 0);
        assert_eq!(backend.live_shaders(), 0);
    }

    #[test]
    fn rebuilds_after_release() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut cache = cache();
        cache.get_or_create(&mut backend, VariantKey::PositionColor);
        cache.release_all(&mut backend);

        cache.get_or_create(&mut backend, VariantKey::PositionColor);

        assert_eq!(backend.compiles(ShaderStage::Fragment), 2);
        assert_eq!(backend.live_programs(), 1);
        assert_eq!(backend.live_shaders(), 2);
    }
}
