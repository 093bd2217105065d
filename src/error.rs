//! Load-time errors
//!
//! Only resource loading can fail recoverably. Precondition violations inside
//! the simulation are programming defects and are debug-asserted instead.

use thiserror::Error;

/// Errors raised while loading materials or parameters
#[derive(Debug, Error)]
pub enum GameError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("material \"{material}\": {message}")]
    InvalidMaterial { material: String, message: String },

    #[error("invalid hex colour \"{0}\"")]
    InvalidColour(String),

    #[error("unrecognized electrical element type \"{0}\"")]
    UnknownElectricalElementType(String),

    #[error("unrecognized sound element type \"{0}\"")]
    UnknownSoundElementType(String),

    #[error("material \"{0}\" is defined more than once")]
    DuplicateMaterial(String),
}

pub type Result<T> = std::result::Result<T, GameError>;
