pub mod types;
pub mod prompt;
pub mod generator;
pub mod ollama;
pub mod openai;
pub mod synthesizer;

pub use types::*;
pub use prompt::*;
pub use generator::*;
pub use ollama::*;
pub use openai::*;
pub use synthesizer::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation service unreachable: {0}")]
    Connection(String),

    /// Client could not be built from the supplied settings.
    #[error("Generation backend misconfigured: {0}")]
    Configuration(String),

    #[error("Generation request timed out after {0}s")]
    Timeout(u64),

    #[error("Generation service returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Generation returned no usable output")]
    EmptyResponse,

    /// A synthesis stage failed; no partial reply is returned.
    #[error("{role} stage failed: {cause}")]
    Stage {
        role: StageRole,
        cause: Box<GenerationError>,
    },
}

impl GenerationError {
    pub fn in_stage(self, role: StageRole) -> Self {
        match self {
            stage @ GenerationError::Stage { .. } => stage,
            cause => GenerationError::Stage {
                role,
                cause: Box::new(cause),
            },
        }
    }

    /// Role of the failed stage, if this error came out of synthesis.
    pub fn stage_role(&self) -> Option<StageRole> {
        match self {
            GenerationError::Stage { role, .. } => Some(*role),
            _ => None,
        }
    }
}
