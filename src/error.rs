//! Error kinds for the generation pipeline.
//!
//! Every failure is detected before any output is written; there is no
//! partial-output state to report. Each variant carries enough context
//! (type, field, contributing document) to be directly actionable.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The byte prefix matched no recognized encoding pattern, or the
    /// decoded text was not valid in the detected encoding.
    #[error("{document}: undetected text encoding ({detail})")]
    EncodingUndetected { document: String, detail: String },

    /// Invalid JSON, or JSON that does not match the layout schema.
    #[error("{document}: malformed document at {path}: {detail}")]
    MalformedDocument {
        document: String,
        path: String,
        detail: String,
    },

    /// The same type name was declared with incompatible layouts across
    /// merged input documents.
    #[error(
        "conflicting definitions for type `{name}` (declared in {first_document}, redeclared differently in {second_document})"
    )]
    ConflictingDefinition {
        name: String,
        first_document: String,
        second_document: String,
    },

    /// A field (or root) refers to a name absent from the merged namespace.
    #[error("field `{field}` of `{containing}` references undeclared type `{name}`")]
    MissingTypeReference {
        name: String,
        containing: String,
        field: String,
    },

    /// Unions, function pointers, and non-character pointers are rejected,
    /// never approximated.
    #[error("unsupported kind: {detail}")]
    UnsupportedKind {
        containing: String,
        field: String,
        detail: String,
    },

    /// A struct transitively contains itself by value.
    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("root type `{name}` {reason}")]
    RootNotFound { name: String, reason: String },

    /// No `--root` was given and the namespace does not contain exactly
    /// one struct to default to.
    #[error("no root given and the inputs declare {count} structs; pass --root <TypeName>")]
    RootUnspecified { count: usize },
}
