//! Error types for rule loading and evaluation

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning rule descriptors into live rules, or while
/// evaluating a single rule target.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown {family} condition `{kind}`")]
    UnknownCondition { family: &'static str, kind: String },

    #[error("unknown rule target `{0}`")]
    UnknownTarget(String),

    #[error("descriptor has none of `abnormalities`, `type = \"reset\"`, `skills`, `items`")]
    UnrecognizedShape,

    #[error("failed to read rule file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule TOML in {path}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("evaluation failed for target {target}: {reason}")]
    Evaluation { target: String, reason: String },
}
