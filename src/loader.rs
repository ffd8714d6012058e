//! Schema loader: bytes in unknown encoding -> merged raw namespace.
//!
//! Accepts the two document shapes produced by layout extractors:
//! a multi-type map under `types`, or the single-struct sugar
//! (`struct`/`size`/`fields` at the top level). Declarations from
//! successive documents fold into one namespace in input order; a name
//! collision is tolerated only when the two declarations are structurally
//! identical.
//!
//! The loader never touches the filesystem; callers hand it named byte
//! buffers.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::config::{EncodingMode, GenerateConfig};
use crate::error::{Error, Result};

// ————————————————————————————————————————————————————————————————————————————
// RAW DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

/// One struct member, exactly as declared in the document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// Byte offset within the host struct. Informational only.
    pub offset: Option<u64>,
    pub size: Option<u64>,
    /// Bit count for members sourced from packed bitfield storage.
    pub bits: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawEnumValue {
    pub name: String,
    pub value: i64,
}

/// An unvalidated type declaration. `kind` stays a string here; the graph
/// builder converts it into the closed descriptor model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawDecl {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub size: Option<u64>,
    #[serde(default)]
    pub fields: Vec<RawField>,
    pub underlying: Option<String>,
    #[serde(default)]
    pub values: Vec<RawEnumValue>,
}

fn default_kind() -> String {
    "struct".to_string()
}

#[derive(Debug, Clone)]
pub struct RawEntry {
    pub decl: RawDecl,
    /// Document the declaration first came from, for diagnostics.
    pub document: String,
}

/// The merged namespace, in first-seen declaration order.
#[derive(Debug, Clone, Default)]
pub struct RawNamespace {
    pub entries: IndexMap<String, RawEntry>,
}

// Typed views of the two accepted document shapes.

#[derive(Debug, Deserialize)]
struct MultiTypeDoc {
    types: IndexMap<String, RawDecl>,
}

#[derive(Debug, Deserialize)]
struct SingleStructDoc {
    #[serde(rename = "struct")]
    name: String,
    size: Option<u64>,
    fields: Vec<RawField>,
}

// ————————————————————————————————————————————————————————————————————————————
// ENCODING DETECTION
// ————————————————————————————————————————————————————————————————————————————

/// Decode a document buffer to text according to the configured mode.
pub fn decode_text(bytes: &[u8], mode: EncodingMode, document: &str) -> Result<String> {
    let undetected = |detail: &str| Error::EncodingUndetected {
        document: document.to_string(),
        detail: detail.to_string(),
    };

    match mode {
        EncodingMode::Auto => {
            // UTF-32 BOMs before UTF-16: FF FE 00 00 starts with FF FE.
            if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
                decode_utf32(&bytes[4..], true, document)
            } else if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
                decode_utf32(&bytes[4..], false, document)
            } else if bytes.starts_with(&[0xFF, 0xFE]) {
                decode_utf16(&bytes[2..], true, document)
            } else if bytes.starts_with(&[0xFE, 0xFF]) {
                decode_utf16(&bytes[2..], false, document)
            } else {
                let rest = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);
                std::str::from_utf8(rest)
                    .map(str::to_string)
                    .map_err(|_| undetected("no BOM and not valid UTF-8"))
            }
        }
        EncodingMode::Utf8 => {
            let rest = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);
            std::str::from_utf8(rest)
                .map(str::to_string)
                .map_err(|_| undetected("not valid UTF-8"))
        }
        EncodingMode::Utf16 => {
            if bytes.starts_with(&[0xFF, 0xFE]) {
                decode_utf16(&bytes[2..], true, document)
            } else if bytes.starts_with(&[0xFE, 0xFF]) {
                decode_utf16(&bytes[2..], false, document)
            } else {
                decode_utf16(bytes, true, document)
            }
        }
        EncodingMode::Utf32 => {
            if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
                decode_utf32(&bytes[4..], true, document)
            } else if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
                decode_utf32(&bytes[4..], false, document)
            } else {
                decode_utf32(bytes, true, document)
            }
        }
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool, document: &str) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::EncodingUndetected {
            document: document.to_string(),
            detail: "odd byte count for UTF-16".to_string(),
        });
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            if little_endian {
                u16::from_le_bytes(pair)
            } else {
                u16::from_be_bytes(pair)
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| Error::EncodingUndetected {
        document: document.to_string(),
        detail: "invalid UTF-16 code units".to_string(),
    })
}

fn decode_utf32(bytes: &[u8], little_endian: bool, document: &str) -> Result<String> {
    if bytes.len() % 4 != 0 {
        return Err(Error::EncodingUndetected {
            document: document.to_string(),
            detail: "byte count not a multiple of 4 for UTF-32".to_string(),
        });
    }
    bytes
        .chunks_exact(4)
        .map(|quad| {
            let quad = [quad[0], quad[1], quad[2], quad[3]];
            let unit = if little_endian {
                u32::from_le_bytes(quad)
            } else {
                u32::from_be_bytes(quad)
            };
            char::from_u32(unit).ok_or_else(|| Error::EncodingUndetected {
                document: document.to_string(),
                detail: format!("invalid UTF-32 code point 0x{unit:08X}"),
            })
        })
        .collect()
}

// ————————————————————————————————————————————————————————————————————————————
// PARSE & MERGE
// ————————————————————————————————————————————————————————————————————————————

/// Load and merge a batch of documents into one raw namespace.
///
/// `documents` pairs a display name (usually the path) with the raw bytes.
pub fn load_documents(
    documents: &[(String, Vec<u8>)],
    config: &GenerateConfig,
) -> Result<RawNamespace> {
    let mut namespace = RawNamespace::default();
    for (name, bytes) in documents {
        let text = decode_text(bytes, config.encoding, name)?;
        merge_document(&mut namespace, name, &text)?;
    }
    Ok(namespace)
}

fn merge_document(namespace: &mut RawNamespace, document: &str, text: &str) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::MalformedDocument {
            document: document.to_string(),
            path: format!("line {}, column {}", e.line(), e.column()),
            detail: e.to_string(),
        })?;

    if value.get("types").is_some() {
        let doc: MultiTypeDoc = deserialize_shape(document, value)?;
        for (name, decl) in doc.types {
            merge_decl(namespace, document, name, decl)?;
        }
        Ok(())
    } else if value.get("struct").is_some() {
        let doc: SingleStructDoc = deserialize_shape(document, value)?;
        let decl = RawDecl {
            kind: "struct".to_string(),
            size: doc.size,
            fields: doc.fields,
            underlying: None,
            values: Vec::new(),
        };
        merge_decl(namespace, document, doc.name, decl)
    } else {
        Err(Error::MalformedDocument {
            document: document.to_string(),
            path: "$".to_string(),
            detail: "document needs a `types` map or a top-level `struct`".to_string(),
        })
    }
}

fn deserialize_shape<T: serde::de::DeserializeOwned>(
    document: &str,
    value: serde_json::Value,
) -> Result<T> {
    let deserializer = value;
    serde_path_to_error::deserialize(deserializer).map_err(|e| Error::MalformedDocument {
        document: document.to_string(),
        path: e.path().to_string(),
        detail: e.inner().to_string(),
    })
}

fn merge_decl(
    namespace: &mut RawNamespace,
    document: &str,
    name: String,
    decl: RawDecl,
) -> Result<()> {
    match namespace.entries.get(&name) {
        // Identical re-declaration: keep the first, including its origin.
        Some(existing) if existing.decl == decl => Ok(()),
        Some(existing) => Err(Error::ConflictingDefinition {
            name,
            first_document: existing.document.clone(),
            second_document: document.to_string(),
        }),
        None => {
            namespace.entries.insert(
                name,
                RawEntry {
                    decl,
                    document: document.to_string(),
                },
            );
            Ok(())
        }
    }
}
