//! Type graph builder: raw declarations -> validated `TypeDescriptor` model.
//!
//! This is the generator's type-safety boundary. Every raw declaration is
//! converted into a closed tagged variant here, with referential integrity
//! checked against the merged namespace; later stages dispatch exhaustively
//! on the tags and never sniff strings again.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::loader::{RawDecl, RawNamespace};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Primitive C kinds the generator understands. Each maps to one JSON
/// scalar kind (number or boolean) plus a cJSON accessor in the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    Char,
    Bool,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
}

impl PrimKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "char" => Self::Char,
            "bool" | "_Bool" => Self::Bool,
            "int" => Self::Int,
            "unsigned int" => Self::UInt,
            "long" => Self::Long,
            "unsigned long" => Self::ULong,
            "float" => Self::Float,
            "double" => Self::Double,
            _ => return None,
        })
    }

    /// Acceptable as an enum's underlying storage.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::UInt | Self::Long | Self::ULong)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

/// A struct member's resolved type shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(PrimKind),
    /// A declared struct or enum; the graph holds its descriptor.
    Named(String),
    /// `char[N]`: NUL-truncated text, not an array of numbers.
    CharString { max_len: usize },
    /// `char*`: nullable text. The only pointer shape accepted.
    CharPtr,
    /// `T[N]` for primitive, struct, or enum element types.
    Array { elem: Box<FieldType>, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    /// Byte offset in the host struct; informational only.
    pub offset: Option<u64>,
    /// Set for members sourced from packed bitfield storage. The emitter
    /// treats such members exactly as their storage integer.
    pub bits: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

/// Exactly one variant is active per declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Struct {
        size: Option<u64>,
        fields: Vec<Field>,
    },
    Enum {
        underlying: PrimKind,
        /// Declaration order; duplicates and gaps are allowed.
        values: Vec<EnumValue>,
    },
}

/// The validated namespace, in first-seen declaration order. Immutable
/// once built; the resolver and emitter treat it as read-only.
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    pub types: IndexMap<String, TypeDescriptor>,
}

impl TypeGraph {
    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn is_struct(&self, name: &str) -> bool {
        matches!(self.get(name), Some(TypeDescriptor::Struct { .. }))
    }

    /// Position in first-seen order, for the resolver's tie-break.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.types.get_index_of(name)
    }

    /// Named types a type depends on, in field order. Arrays are
    /// transparent; char strings and char pointers are leaves.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        let Some(TypeDescriptor::Struct { fields, .. }) = self.get(name) else {
            return Vec::new();
        };
        let mut deps = Vec::new();
        for field in fields {
            if let Some(base) = named_base(&field.ty) {
                if !deps.contains(&base) {
                    deps.push(base);
                }
            }
        }
        deps
    }
}

fn named_base(ty: &FieldType) -> Option<&str> {
    match ty {
        FieldType::Named(name) => Some(name),
        FieldType::Array { elem, .. } => named_base(elem),
        FieldType::Primitive(_) | FieldType::CharString { .. } | FieldType::CharPtr => None,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILD
// ————————————————————————————————————————————————————————————————————————————

/// Validate every raw declaration and resolve every field reference.
pub fn build_graph(namespace: &RawNamespace) -> Result<TypeGraph> {
    let mut graph = TypeGraph::default();
    for (name, entry) in &namespace.entries {
        let descriptor = build_descriptor(namespace, name, &entry.decl, &entry.document)?;
        graph.types.insert(name.clone(), descriptor);
    }
    Ok(graph)
}

fn build_descriptor(
    namespace: &RawNamespace,
    name: &str,
    decl: &RawDecl,
    document: &str,
) -> Result<TypeDescriptor> {
    match decl.kind.as_str() {
        "struct" => build_struct(namespace, name, decl, document),
        "enum" => build_enum(name, decl, document),
        "union" => Err(Error::UnsupportedKind {
            containing: name.to_string(),
            field: String::new(),
            detail: format!("type `{name}` is a union; unions are not supported"),
        }),
        other => Err(Error::MalformedDocument {
            document: document.to_string(),
            path: format!("types.{name}.kind"),
            detail: format!("unknown kind `{other}` (expected `struct` or `enum`)"),
        }),
    }
}

fn build_struct(
    namespace: &RawNamespace,
    name: &str,
    decl: &RawDecl,
    document: &str,
) -> Result<TypeDescriptor> {
    let mut fields: Vec<Field> = Vec::with_capacity(decl.fields.len());
    for raw in &decl.fields {
        if fields.iter().any(|f| f.name == raw.name) {
            return Err(Error::MalformedDocument {
                document: document.to_string(),
                path: format!("types.{name}.fields"),
                detail: format!("duplicate field name `{}`", raw.name),
            });
        }
        let ty = parse_type_string(namespace, name, &raw.name, &raw.ty)?;
        fields.push(Field {
            name: raw.name.clone(),
            ty,
            offset: raw.offset,
            bits: raw.bits,
        });
    }
    Ok(TypeDescriptor::Struct {
        size: decl.size,
        fields,
    })
}

fn build_enum(name: &str, decl: &RawDecl, document: &str) -> Result<TypeDescriptor> {
    let keyword = decl.underlying.as_deref().unwrap_or("int");
    let underlying = PrimKind::from_keyword(keyword).filter(|k| k.is_integer());
    let Some(underlying) = underlying else {
        return Err(Error::MalformedDocument {
            document: document.to_string(),
            path: format!("types.{name}.underlying"),
            detail: format!("enum underlying type `{keyword}` is not an integer kind"),
        });
    };
    Ok(TypeDescriptor::Enum {
        underlying,
        values: decl
            .values
            .iter()
            .map(|v| EnumValue {
                name: v.name.clone(),
                value: v.value,
            })
            .collect(),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE-STRING GRAMMAR
// ————————————————————————————————————————————————————————————————————————————

// `<base>[N]`, tolerating interior whitespace.
static ARRAY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?<base>.*?)\s*\[\s*(?<len>\d+)\s*\]$").unwrap());

/// Parse a field's declared type string: `<base>` | `<base>[N]` | `<base>*`.
fn parse_type_string(
    namespace: &RawNamespace,
    containing: &str,
    field: &str,
    raw: &str,
) -> Result<FieldType> {
    let text = raw.trim();

    // Function pointers come out of extractors with a parameter list.
    if text.contains('(') {
        return Err(Error::UnsupportedKind {
            containing: containing.to_string(),
            field: field.to_string(),
            detail: format!(
                "field `{field}` of `{containing}` has function pointer type `{raw}`"
            ),
        });
    }

    if let Some(caps) = ARRAY_SUFFIX.captures(text) {
        let base = caps.name("base").unwrap().as_str();
        let len: usize = caps.name("len").unwrap().as_str().parse().map_err(|_| {
            Error::UnsupportedKind {
                containing: containing.to_string(),
                field: field.to_string(),
                detail: format!(
                    "field `{field}` of `{containing}` has unparseable array length in `{raw}`"
                ),
            }
        })?;
        if base == "char" {
            return Ok(FieldType::CharString { max_len: len });
        }
        let elem = parse_type_string(namespace, containing, field, base)?;
        if !matches!(elem, FieldType::Primitive(_) | FieldType::Named(_)) {
            return Err(Error::UnsupportedKind {
                containing: containing.to_string(),
                field: field.to_string(),
                detail: format!(
                    "field `{field}` of `{containing}`: array element type `{base}` is not a primitive, struct, or enum"
                ),
            });
        }
        return Ok(FieldType::Array {
            elem: Box::new(elem),
            len,
        });
    }

    if let Some(pointee) = text.strip_suffix('*') {
        let pointee = pointee.trim();
        if pointee == "char" {
            return Ok(FieldType::CharPtr);
        }
        // Expanding arbitrary pointer graphs from a flat offset-based
        // schema is unsound without aliasing information; reject.
        return Err(Error::UnsupportedKind {
            containing: containing.to_string(),
            field: field.to_string(),
            detail: format!(
                "field `{field}` of `{containing}` has non-character pointer type `{raw}`"
            ),
        });
    }

    if let Some(prim) = PrimKind::from_keyword(text) {
        return Ok(FieldType::Primitive(prim));
    }

    if namespace.entries.contains_key(text) {
        return Ok(FieldType::Named(text.to_string()));
    }

    Err(Error::MissingTypeReference {
        name: text.to_string(),
        containing: containing.to_string(),
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerateConfig;
    use crate::loader::load_documents;

    fn graph_from(doc: &str) -> Result<TypeGraph> {
        let ns = load_documents(
            &[("test.json".to_string(), doc.as_bytes().to_vec())],
            &GenerateConfig::default(),
        )?;
        build_graph(&ns)
    }

    fn field<'a>(graph: &'a TypeGraph, ty: &str, name: &str) -> &'a Field {
        match graph.get(ty).unwrap() {
            TypeDescriptor::Struct { fields, .. } => {
                fields.iter().find(|f| f.name == name).unwrap()
            }
            TypeDescriptor::Enum { .. } => panic!("{ty} is an enum"),
        }
    }

    #[test]
    fn field_shapes_resolve() {
        let graph = graph_from(
            r#"{"types": {
                "Color": {"kind": "enum", "underlying": "int",
                          "values": [{"name": "RED", "value": 0}]},
                "Box": {"kind": "struct", "size": 64, "fields": [
                    {"name": "id", "type": "unsigned long", "offset": 0},
                    {"name": "label", "type": "char[16]", "offset": 8},
                    {"name": "note", "type": "char*", "offset": 24},
                    {"name": "tint", "type": "Color", "offset": 32},
                    {"name": "weights", "type": "double[3]", "offset": 40}
                ]}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            field(&graph, "Box", "id").ty,
            FieldType::Primitive(PrimKind::ULong)
        );
        assert_eq!(
            field(&graph, "Box", "label").ty,
            FieldType::CharString { max_len: 16 }
        );
        assert_eq!(field(&graph, "Box", "note").ty, FieldType::CharPtr);
        assert_eq!(
            field(&graph, "Box", "tint").ty,
            FieldType::Named("Color".to_string())
        );
        assert_eq!(
            field(&graph, "Box", "weights").ty,
            FieldType::Array {
                elem: Box::new(FieldType::Primitive(PrimKind::Double)),
                len: 3
            }
        );
    }

    #[test]
    fn void_pointer_is_unsupported() {
        let err = graph_from(
            r#"{"types": {"S": {"kind": "struct", "fields": [
                {"name": "cookie", "type": "void*", "offset": 0}
            ]}}}"#,
        )
        .unwrap_err();
        match err {
            Error::UnsupportedKind {
                containing, field, ..
            } => {
                assert_eq!(containing, "S");
                assert_eq!(field, "cookie");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn function_pointer_is_unsupported() {
        let err = graph_from(
            r#"{"types": {"S": {"kind": "struct", "fields": [
                {"name": "cb", "type": "int (*)(void)", "offset": 0}
            ]}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedKind { .. }), "{err}");
    }

    #[test]
    fn union_declaration_is_unsupported() {
        let err =
            graph_from(r#"{"types": {"U": {"kind": "union", "fields": []}}}"#).unwrap_err();
        match err {
            Error::UnsupportedKind { containing, .. } => assert_eq!(containing, "U"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn undeclared_reference_is_missing() {
        let err = graph_from(
            r#"{"types": {"S": {"kind": "struct", "fields": [
                {"name": "inner", "type": "Mystery", "offset": 0}
            ]}}}"#,
        )
        .unwrap_err();
        match err {
            Error::MissingTypeReference {
                name,
                containing,
                field,
            } => {
                assert_eq!(name, "Mystery");
                assert_eq!(containing, "S");
                assert_eq!(field, "inner");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_field_name_is_malformed() {
        let err = graph_from(
            r#"{"types": {"S": {"kind": "struct", "fields": [
                {"name": "x", "type": "int", "offset": 0},
                {"name": "x", "type": "int", "offset": 4}
            ]}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }), "{err}");
    }

    #[test]
    fn enum_underlying_must_be_integer() {
        let err = graph_from(
            r#"{"types": {"E": {"kind": "enum", "underlying": "float", "values": []}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }), "{err}");
    }

    #[test]
    fn enum_values_may_repeat_and_gap() {
        let graph = graph_from(
            r#"{"types": {"E": {"kind": "enum", "underlying": "unsigned int", "values": [
                {"name": "A", "value": 1},
                {"name": "B", "value": 1},
                {"name": "C", "value": 10}
            ]}}}"#,
        )
        .unwrap();
        match graph.get("E").unwrap() {
            TypeDescriptor::Enum { underlying, values } => {
                assert_eq!(*underlying, PrimKind::UInt);
                assert_eq!(values.len(), 3);
                assert_eq!(values[1].value, 1);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn bitfield_members_keep_their_storage_type() {
        let graph = graph_from(
            r#"{"types": {"Flags": {"kind": "struct", "fields": [
                {"name": "enabled", "type": "unsigned int", "offset": 0, "bits": 1},
                {"name": "mode", "type": "unsigned int", "offset": 0, "bits": 3}
            ]}}}"#,
        )
        .unwrap();
        let f = field(&graph, "Flags", "mode");
        assert_eq!(f.ty, FieldType::Primitive(PrimKind::UInt));
        assert_eq!(f.bits, Some(3));
    }

    #[test]
    fn dependencies_strip_array_wrappers() {
        let graph = graph_from(
            r#"{"types": {
                "Point": {"kind": "struct", "fields": [
                    {"name": "x", "type": "float", "offset": 0}
                ]},
                "Path": {"kind": "struct", "fields": [
                    {"name": "pts", "type": "Point[8]", "offset": 0},
                    {"name": "name", "type": "char[8]", "offset": 64}
                ]}
            }}"#,
        )
        .unwrap();
        assert_eq!(graph.dependencies_of("Path"), vec!["Point"]);
        assert!(graph.dependencies_of("Point").is_empty());
    }
}
