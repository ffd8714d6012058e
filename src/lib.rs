//! cwrapgen: generate C JSON (de)serialization wrappers from layout JSON.
//!
//! A layout extractor (PDB/DWARF reader, hand-written JSON, anything that
//! speaks the schema) describes structs and enums as a JSON document; this
//! crate turns that description into a C header/source pair implementing
//! `_to_json`, `_from_json`, and `_equals` for every type reachable from
//! the chosen roots, using cJSON.
//!
//! The pipeline runs strictly loader -> graph builder -> resolver ->
//! emitter; no stage re-enters an earlier one, and every error is detected
//! before any output text is produced.

pub mod cli;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod loader;
pub mod resolve;

pub use config::{EncodingMode, GenerateConfig};
pub use emit::GeneratedPair;
pub use error::{Error, Result};

/// One finished generation run.
#[derive(Debug, Clone)]
pub struct Generation {
    pub header: String,
    pub source: String,
    /// Emission order: every type after all types it depends on.
    pub order: Vec<String>,
    pub roots: Vec<String>,
}

/// Outcome of a validation-only run. No output text is rendered.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub roots: Vec<String>,
    pub order: Vec<String>,
}

/// Run the whole pipeline over in-memory documents.
///
/// `documents` pairs a display name (usually the input path) with raw
/// bytes; `out_stem` is the output base file name, used for the generated
/// `#include` and the default header guard.
pub fn generate(
    documents: &[(String, Vec<u8>)],
    roots: &[String],
    out_stem: &str,
    config: &GenerateConfig,
) -> Result<Generation> {
    let (graph, resolution) = resolve_pipeline(documents, roots, config)?;
    let pair = emit::emit(
        &graph,
        &resolution.order,
        &resolution.roots,
        config,
        out_stem,
    );
    Ok(Generation {
        header: pair.header,
        source: pair.source,
        order: resolution.order,
        roots: resolution.roots,
    })
}

/// Run the loader, graph builder, and resolver only.
pub fn check(
    documents: &[(String, Vec<u8>)],
    roots: &[String],
    config: &GenerateConfig,
) -> Result<Resolution> {
    let (_, resolution) = resolve_pipeline(documents, roots, config)?;
    Ok(resolution)
}

fn resolve_pipeline(
    documents: &[(String, Vec<u8>)],
    roots: &[String],
    config: &GenerateConfig,
) -> Result<(graph::TypeGraph, Resolution)> {
    let namespace = loader::load_documents(documents, config)?;
    let graph = graph::build_graph(&namespace)?;
    let roots = resolve::choose_roots(&graph, roots)?;
    let order = resolve::emission_order(&graph, &roots)?;
    Ok((graph, Resolution { roots, order }))
}
