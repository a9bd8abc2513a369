use std::fmt;

use super::{ShaderStage, VariantKey};

/// Non-fatal problem found while building a program.
///
/// Programs with diagnostics are still cached and used; their draws may
/// render incorrectly or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramDiagnostic {
    Compile {
        variant: VariantKey,
        stage: ShaderStage,
        log: String,
    },
    Link {
        variant: VariantKey,
        log: String,
    },
}

impl fmt::Display for ProgramDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile {
                variant,
                stage,
                log,
            } => write!(
                f,
                "error compiling {} stage for {}: {log}",
                stage.label(),
                variant.label()
            ),
            Self::Link { variant, log } => {
                write!(f, "error linking program {}: {log}", variant.label())
            }
        }
    }
}

impl std::error::Error for ProgramDiagnostic {}
