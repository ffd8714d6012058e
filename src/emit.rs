//! Code emitter: ordered type list -> generated C header and source text.
//!
//! Every struct and enum in the resolved closure gets a `_to_json` /
//! `_from_json` / `_equals` triplet. Root types are public and declared in
//! the header; dependency types are emitted as `static` helpers with
//! forward declarations. The emitter does no validation of its own: the
//! builder and resolver already established every invariant it relies on.
//!
//! Policy per kind:
//! - primitives: JSON number (booleans: JSON bool), read only after a
//!   presence-and-kind check, so a missing member stays untouched;
//! - `char[N]`: JSON string, truncated at the first NUL within capacity;
//! - `char*`: JSON string, NULL serialized as `""`, `strdup` on read;
//! - enums: the stored integer value, via the enum's own triplet;
//! - nested structs and arrays: recurse.

use std::collections::HashSet;

use crate::config::GenerateConfig;
use crate::graph::{Field, FieldType, PrimKind, TypeDescriptor, TypeGraph};

/// Rendered output files. Written to disk only after the whole pipeline
/// has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPair {
    pub header: String,
    pub source: String,
}

pub fn emit(
    graph: &TypeGraph,
    order: &[String],
    roots: &[String],
    config: &GenerateConfig,
    out_stem: &str,
) -> GeneratedPair {
    let emitter = Emitter {
        graph,
        config,
        roots: roots.iter().map(String::as_str).collect(),
    };
    GeneratedPair {
        header: emitter.render_header(order, out_stem),
        source: emitter.render_source(order, out_stem),
    }
}

struct Emitter<'a> {
    graph: &'a TypeGraph,
    config: &'a GenerateConfig,
    roots: HashSet<&'a str>,
}

impl<'a> Emitter<'a> {
    fn sym(&self, type_name: &str, suffix: &str) -> String {
        format!(
            "{}{}_{}",
            self.config.function_name_prefix, type_name, suffix
        )
    }

    fn is_root(&self, name: &str) -> bool {
        self.roots.contains(name)
    }

    // ———————————————————————————— header ————————————————————————————

    fn render_header(&self, order: &[String], out_stem: &str) -> String {
        let guard = self.config.header_guard_for(out_stem);
        let mut h = Vec::new();
        h.push(format!("#ifndef {guard}"));
        h.push(format!("#define {guard}"));
        h.push(String::new());
        h.push("#include <string.h>".to_string());
        h.push(format!("#include \"{}\"", self.config.include_header_for_types));
        h.push(format!(
            "#include \"{}\"",
            self.config.include_header_for_json_lib
        ));
        h.push(String::new());
        h.push("/* Generated by cwrapgen. Do not edit. */".to_string());
        h.push(String::new());
        h.push("#ifdef __cplusplus".to_string());
        h.push("extern \"C\" {".to_string());
        h.push("#endif".to_string());
        h.push(String::new());

        let public: Vec<&String> = order.iter().filter(|n| self.is_root(n)).collect();
        for (i, name) in public.iter().enumerate() {
            for line in self.prototypes(name, true) {
                h.push(line);
            }
            if i != public.len() - 1 {
                h.push(String::new());
            }
        }

        h.push(String::new());
        h.push("#ifdef __cplusplus".to_string());
        h.push("} /* extern \"C\" */".to_string());
        h.push("#endif".to_string());
        h.push(String::new());
        h.push(format!("#endif /* {guard} */"));
        h.push(String::new());
        h.join("\n")
    }

    /// Declarations for one type's triplet. Enum triplets are value-shaped
    /// since enums have no members to walk.
    fn prototypes(&self, name: &str, public: bool) -> Vec<String> {
        let storage = if public { "" } else { "static " };
        let to = self.sym(name, "to_json");
        let from = self.sym(name, "from_json");
        let eq = self.sym(name, "equals");
        match self.graph.get(name).unwrap() {
            TypeDescriptor::Struct { .. } => vec![
                format!("{storage}void {to}(const {name} *value, cJSON *obj);"),
                format!("{storage}void {from}({name} *out, const cJSON *obj);"),
                format!("{storage}int {eq}(const {name} *a, const {name} *b);"),
            ],
            TypeDescriptor::Enum { .. } => vec![
                format!("{storage}cJSON *{to}(const {name} *value);"),
                format!("{storage}void {from}({name} *out, const cJSON *node);"),
                format!("{storage}int {eq}(const {name} *a, const {name} *b);"),
            ],
        }
    }

    // ———————————————————————————— source ————————————————————————————

    fn render_source(&self, order: &[String], out_stem: &str) -> String {
        let macro_prefix = self.config.macro_prefix();
        let mut c = Vec::new();
        c.push("/* Generated by cwrapgen. Do not edit. */".to_string());
        c.push(format!("#include \"{out_stem}.h\""));
        c.push("#include <math.h>".to_string());
        c.push("#include <stdlib.h>".to_string());
        c.push(String::new());
        c.push(format!("#ifndef {macro_prefix}FLOAT_EPSILON"));
        c.push(format!("#define {macro_prefix}FLOAT_EPSILON 1e-6f"));
        c.push("#endif".to_string());
        c.push(format!("#ifndef {macro_prefix}DOUBLE_EPSILON"));
        c.push(format!("#define {macro_prefix}DOUBLE_EPSILON 1e-9"));
        c.push("#endif".to_string());
        c.push(String::new());

        let helpers: Vec<&String> = order.iter().filter(|n| !self.is_root(n)).collect();
        if !helpers.is_empty() {
            c.push("/* Forward declarations for static helpers */".to_string());
            for name in &helpers {
                c.extend(self.prototypes(name, false));
                c.push(String::new());
            }
        }

        for name in order {
            match self.graph.get(name).unwrap() {
                TypeDescriptor::Struct { fields, .. } => {
                    c.extend(self.struct_impl(name, fields, &macro_prefix));
                }
                TypeDescriptor::Enum { underlying, .. } => {
                    c.extend(self.enum_impl(name, *underlying));
                }
            }
        }
        c.join("\n")
    }

    fn enum_impl(&self, name: &str, underlying: PrimKind) -> Vec<String> {
        let storage_fn = if self.is_root(name) { "" } else { "static " };
        let to = self.sym(name, "to_json");
        let from = self.sym(name, "from_json");
        let eq = self.sym(name, "equals");
        // Same accessor policy as struct members: valueint only fits a
        // plain int, everything wider reads through valuedouble.
        let read = prim_read_expr(underlying, "node");
        let mut c = Vec::new();
        c.push(format!("{storage_fn}cJSON *{to}(const {name} *value) {{"));
        c.push("\treturn cJSON_CreateNumber((double)*value);".to_string());
        c.push("}".to_string());
        c.push(String::new());
        c.push(format!("{storage_fn}void {from}({name} *out, const cJSON *node) {{"));
        c.push("\tif (node && cJSON_IsNumber(node)) {".to_string());
        c.push(format!("\t\t*out = ({name}){read};"));
        c.push("\t}".to_string());
        c.push("}".to_string());
        c.push(String::new());
        c.push(format!(
            "{storage_fn}int {eq}(const {name} *a, const {name} *b) {{"
        ));
        c.push("\tif (a == b) return 1;".to_string());
        c.push("\tif (!a || !b) return 0;".to_string());
        c.push("\treturn *a == *b;".to_string());
        c.push("}".to_string());
        c.push(String::new());
        c
    }

    fn struct_impl(&self, name: &str, fields: &[Field], macro_prefix: &str) -> Vec<String> {
        let storage_void = if self.is_root(name) { "void" } else { "static void" };
        let storage_int = if self.is_root(name) { "int" } else { "static int" };
        let mut c = Vec::new();

        c.push(format!(
            "{storage_void} {}(const {name} *value, cJSON *obj) {{",
            self.sym(name, "to_json")
        ));
        for field in fields {
            c.extend(self.to_json_for_field(&field.name, &field.ty));
        }
        c.push("}".to_string());
        c.push(String::new());

        c.push(format!(
            "{storage_void} {}({name} *out, const cJSON *obj) {{",
            self.sym(name, "from_json")
        ));
        for field in fields {
            c.extend(self.from_json_for_field(&field.name, &field.ty));
        }
        c.push("}".to_string());
        c.push(String::new());

        c.push(format!(
            "{storage_int} {}(const {name} *a, const {name} *b) {{",
            self.sym(name, "equals")
        ));
        c.push("\tif (a == b) return 1;".to_string());
        c.push("\tif (!a || !b) return 0;".to_string());
        for field in fields {
            c.extend(self.equals_for_field(&field.name, &field.ty, macro_prefix));
        }
        c.push("\treturn 1;".to_string());
        c.push("}".to_string());
        c.push(String::new());
        c
    }

    // ———————————————————————————— to_json ————————————————————————————

    fn to_json_for_field(&self, fname: &str, ty: &FieldType) -> Vec<String> {
        let mut c = Vec::new();
        match ty {
            FieldType::Primitive(prim) => match prim {
                PrimKind::Bool => c.push(format!(
                    "\tcJSON_AddBoolToObject(obj, \"{fname}\", value->{fname} ? 1 : 0);"
                )),
                PrimKind::Float | PrimKind::Double => c.push(format!(
                    "\tcJSON_AddNumberToObject(obj, \"{fname}\", (double)value->{fname});"
                )),
                _ => c.push(format!(
                    "\tcJSON_AddNumberToObject(obj, \"{fname}\", value->{fname});"
                )),
            },
            FieldType::Named(type_name) => match self.graph.get(type_name).unwrap() {
                TypeDescriptor::Enum { .. } => c.push(format!(
                    "\tcJSON_AddItemToObject(obj, \"{fname}\", {}(&value->{fname}));",
                    self.sym(type_name, "to_json")
                )),
                TypeDescriptor::Struct { .. } => {
                    c.push("\t{".to_string());
                    c.push("\t\tcJSON *child = cJSON_CreateObject();".to_string());
                    c.push(format!(
                        "\t\t{}(&value->{fname}, child);",
                        self.sym(type_name, "to_json")
                    ));
                    c.push(format!("\t\tcJSON_AddItemToObject(obj, \"{fname}\", child);"));
                    c.push("\t}".to_string());
                }
            },
            FieldType::CharString { max_len } => {
                // Truncate at the first NUL within the declared capacity.
                c.push("\t{".to_string());
                c.push(format!("\t\tchar text[{}];", max_len + 1));
                c.push("\t\tsize_t len = 0;".to_string());
                c.push(format!(
                    "\t\twhile (len < {max_len} && value->{fname}[len] != '\\0') {{"
                ));
                c.push("\t\t\t++len;".to_string());
                c.push("\t\t}".to_string());
                c.push(format!("\t\tmemcpy(text, value->{fname}, len);"));
                c.push("\t\ttext[len] = '\\0';".to_string());
                c.push(format!("\t\tcJSON_AddStringToObject(obj, \"{fname}\", text);"));
                c.push("\t}".to_string());
            }
            FieldType::CharPtr => c.push(format!(
                "\tcJSON_AddStringToObject(obj, \"{fname}\", value->{fname} ? value->{fname} : \"\");"
            )),
            FieldType::Array { elem, len } => {
                c.push("\t{".to_string());
                c.push("\t\tcJSON *arr = cJSON_CreateArray();".to_string());
                c.push("\t\tint i;".to_string());
                c.push(format!("\t\tfor (i = 0; i < {len}; ++i) {{"));
                c.extend(self.to_json_for_array_elem(fname, elem));
                c.push("\t\t}".to_string());
                c.push(format!("\t\tcJSON_AddItemToObject(obj, \"{fname}\", arr);"));
                c.push("\t}".to_string());
            }
        }
        c
    }

    fn to_json_for_array_elem(&self, fname: &str, elem: &FieldType) -> Vec<String> {
        let mut c = Vec::new();
        match elem {
            FieldType::Primitive(prim) => match prim {
                PrimKind::Bool => c.push(format!(
                    "\t\t\tcJSON_AddItemToArray(arr, cJSON_CreateBool(value->{fname}[i] ? 1 : 0));"
                )),
                PrimKind::Float | PrimKind::Double => c.push(format!(
                    "\t\t\tcJSON_AddItemToArray(arr, cJSON_CreateNumber((double)value->{fname}[i]));"
                )),
                _ => c.push(format!(
                    "\t\t\tcJSON_AddItemToArray(arr, cJSON_CreateNumber(value->{fname}[i]));"
                )),
            },
            FieldType::Named(type_name) => match self.graph.get(type_name).unwrap() {
                TypeDescriptor::Enum { .. } => c.push(format!(
                    "\t\t\tcJSON_AddItemToArray(arr, {}(&value->{fname}[i]));",
                    self.sym(type_name, "to_json")
                )),
                TypeDescriptor::Struct { .. } => {
                    c.push("\t\t\tcJSON *child = cJSON_CreateObject();".to_string());
                    c.push(format!(
                        "\t\t\t{}(&value->{fname}[i], child);",
                        self.sym(type_name, "to_json")
                    ));
                    c.push("\t\t\tcJSON_AddItemToArray(arr, child);".to_string());
                }
            },
            // The builder only admits primitive and named element types.
            FieldType::CharString { .. } | FieldType::CharPtr | FieldType::Array { .. } => {
                unreachable!("array element shape rejected by the graph builder")
            }
        }
        c
    }

    // ——————————————————————————— from_json ———————————————————————————

    fn from_json_for_field(&self, fname: &str, ty: &FieldType) -> Vec<String> {
        let mut c = Vec::new();
        match ty {
            FieldType::Primitive(prim) => {
                c.push("\t{".to_string());
                c.push(format!(
                    "\t\tconst cJSON *item = cJSON_GetObjectItem(obj, \"{fname}\");"
                ));
                match prim {
                    PrimKind::Bool => {
                        c.push("\t\tif (item && cJSON_IsBool(item)) {".to_string());
                        c.push(format!(
                            "\t\t\tout->{fname} = cJSON_IsTrue(item) ? 1 : 0;"
                        ));
                    }
                    _ => {
                        c.push("\t\tif (item && cJSON_IsNumber(item)) {".to_string());
                        c.push(format!(
                            "\t\t\tout->{fname} = {};",
                            prim_read_expr(*prim, "item")
                        ));
                    }
                }
                c.push("\t\t}".to_string());
                c.push("\t}".to_string());
            }
            FieldType::Named(type_name) => match self.graph.get(type_name).unwrap() {
                TypeDescriptor::Enum { .. } => {
                    c.push("\t{".to_string());
                    c.push(format!(
                        "\t\tconst cJSON *item = cJSON_GetObjectItem(obj, \"{fname}\");"
                    ));
                    c.push("\t\tif (item) {".to_string());
                    c.push(format!(
                        "\t\t\t{}(&out->{fname}, item);",
                        self.sym(type_name, "from_json")
                    ));
                    c.push("\t\t}".to_string());
                    c.push("\t}".to_string());
                }
                TypeDescriptor::Struct { .. } => {
                    c.push("\t{".to_string());
                    c.push(format!(
                        "\t\tconst cJSON *item = cJSON_GetObjectItem(obj, \"{fname}\");"
                    ));
                    c.push("\t\tif (item && cJSON_IsObject(item)) {".to_string());
                    c.push(format!(
                        "\t\t\t{}(&out->{fname}, item);",
                        self.sym(type_name, "from_json")
                    ));
                    c.push("\t\t}".to_string());
                    c.push("\t}".to_string());
                }
            },
            FieldType::CharString { .. } => {
                // Mirror of the write policy: a full-capacity value has no
                // terminator, so copy up to sizeof and zero-pad the rest.
                c.push("\t{".to_string());
                c.push(format!(
                    "\t\tconst cJSON *item = cJSON_GetObjectItem(obj, \"{fname}\");"
                ));
                c.push(
                    "\t\tif (item && cJSON_IsString(item) && item->valuestring) {".to_string(),
                );
                c.push("\t\t\tsize_t len = strlen(item->valuestring);".to_string());
                c.push(format!("\t\t\tif (len > sizeof(out->{fname})) {{"));
                c.push(format!("\t\t\t\tlen = sizeof(out->{fname});"));
                c.push("\t\t\t}".to_string());
                c.push(format!("\t\t\tmemset(out->{fname}, 0, sizeof(out->{fname}));"));
                c.push(format!("\t\t\tmemcpy(out->{fname}, item->valuestring, len);"));
                c.push("\t\t}".to_string());
                c.push("\t}".to_string());
            }
            FieldType::CharPtr => {
                c.push("\t{".to_string());
                c.push(format!(
                    "\t\tconst cJSON *item = cJSON_GetObjectItem(obj, \"{fname}\");"
                ));
                c.push(
                    "\t\tif (item && cJSON_IsString(item) && item->valuestring) {".to_string(),
                );
                c.push("\t\t\t/* NOTE: caller owns (and frees) the previous pointer */".to_string());
                c.push(format!("\t\t\tout->{fname} = strdup(item->valuestring);"));
                c.push("\t\t}".to_string());
                c.push("\t}".to_string());
            }
            FieldType::Array { elem, len } => {
                c.push("\t{".to_string());
                c.push(format!(
                    "\t\tconst cJSON *arr = cJSON_GetObjectItem(obj, \"{fname}\");"
                ));
                c.push("\t\tif (arr && cJSON_IsArray(arr)) {".to_string());
                c.push("\t\t\tint idx = 0;".to_string());
                c.push("\t\t\tcJSON *item = NULL;".to_string());
                c.push("\t\t\tcJSON_ArrayForEach(item, arr) {".to_string());
                c.push(format!("\t\t\t\tif (idx >= {len}) {{"));
                c.push("\t\t\t\t\tbreak;".to_string());
                c.push("\t\t\t\t}".to_string());
                c.extend(self.from_json_for_array_elem(fname, elem));
                c.push("\t\t\t\t++idx;".to_string());
                c.push("\t\t\t}".to_string());
                c.push("\t\t}".to_string());
                c.push("\t}".to_string());
            }
        }
        c
    }

    fn from_json_for_array_elem(&self, fname: &str, elem: &FieldType) -> Vec<String> {
        let mut c = Vec::new();
        match elem {
            FieldType::Primitive(prim) => match prim {
                PrimKind::Bool => {
                    c.push("\t\t\t\tif (cJSON_IsBool(item)) {".to_string());
                    c.push(format!(
                        "\t\t\t\t\tout->{fname}[idx] = cJSON_IsTrue(item) ? 1 : 0;"
                    ));
                    c.push("\t\t\t\t}".to_string());
                }
                _ => {
                    c.push("\t\t\t\tif (cJSON_IsNumber(item)) {".to_string());
                    c.push(format!(
                        "\t\t\t\t\tout->{fname}[idx] = {};",
                        prim_read_expr(*prim, "item")
                    ));
                    c.push("\t\t\t\t}".to_string());
                }
            },
            FieldType::Named(type_name) => match self.graph.get(type_name).unwrap() {
                TypeDescriptor::Enum { .. } => c.push(format!(
                    "\t\t\t\t{}(&out->{fname}[idx], item);",
                    self.sym(type_name, "from_json")
                )),
                TypeDescriptor::Struct { .. } => {
                    c.push("\t\t\t\tif (cJSON_IsObject(item)) {".to_string());
                    c.push(format!(
                        "\t\t\t\t\t{}(&out->{fname}[idx], item);",
                        self.sym(type_name, "from_json")
                    ));
                    c.push("\t\t\t\t}".to_string());
                }
            },
            FieldType::CharString { .. } | FieldType::CharPtr | FieldType::Array { .. } => {
                unreachable!("array element shape rejected by the graph builder")
            }
        }
        c
    }

    // ———————————————————————————— equals ————————————————————————————

    fn equals_for_field(&self, fname: &str, ty: &FieldType, macro_prefix: &str) -> Vec<String> {
        let mut c = Vec::new();
        match ty {
            FieldType::Primitive(prim) => {
                c.push(prim_equals_line(
                    *prim,
                    &format!("a->{fname}"),
                    &format!("b->{fname}"),
                    "\t",
                    macro_prefix,
                ));
            }
            FieldType::Named(type_name) => c.push(format!(
                "\tif (!{}(&a->{fname}, &b->{fname})) return 0;",
                self.sym(type_name, "equals")
            )),
            FieldType::CharString { .. } => c.push(format!(
                "\tif (strncmp(a->{fname}, b->{fname}, sizeof(a->{fname})) != 0) return 0;"
            )),
            FieldType::CharPtr => {
                c.push(format!(
                    "\tif ((a->{fname} ? 1 : 0) != (b->{fname} ? 1 : 0)) return 0;"
                ));
                c.push(format!(
                    "\tif (a->{fname} && strcmp(a->{fname}, b->{fname}) != 0) return 0;"
                ));
            }
            FieldType::Array { elem, len } => {
                c.push("\t{".to_string());
                c.push("\t\tint i;".to_string());
                c.push(format!("\t\tfor (i = 0; i < {len}; ++i) {{"));
                match &**elem {
                    FieldType::Primitive(prim) => c.push(prim_equals_line(
                        *prim,
                        &format!("a->{fname}[i]"),
                        &format!("b->{fname}[i]"),
                        "\t\t\t",
                        macro_prefix,
                    )),
                    FieldType::Named(type_name) => c.push(format!(
                        "\t\t\tif (!{}(&a->{fname}[i], &b->{fname}[i])) return 0;",
                        self.sym(type_name, "equals")
                    )),
                    _ => unreachable!("array element shape rejected by the graph builder"),
                }
                c.push("\t\t}".to_string());
                c.push("\t}".to_string());
            }
        }
        c
    }
}

/// cJSON read expression for a numeric primitive.
fn prim_read_expr(prim: PrimKind, item: &str) -> String {
    match prim {
        PrimKind::Char => format!("(char){item}->valueint"),
        PrimKind::Int => format!("{item}->valueint"),
        PrimKind::UInt => format!("(unsigned int){item}->valuedouble"),
        PrimKind::Long => format!("(long){item}->valuedouble"),
        PrimKind::ULong => format!("(unsigned long){item}->valuedouble"),
        PrimKind::Float => format!("(float){item}->valuedouble"),
        PrimKind::Double => format!("{item}->valuedouble"),
        PrimKind::Bool => unreachable!("bools are read through cJSON_IsTrue"),
    }
}

/// One comparison line; floats compare within the epsilon macros.
fn prim_equals_line(
    prim: PrimKind,
    lhs: &str,
    rhs: &str,
    indent: &str,
    macro_prefix: &str,
) -> String {
    match prim {
        PrimKind::Float => format!(
            "{indent}if (fabsf({lhs} - {rhs}) > {macro_prefix}FLOAT_EPSILON) return 0;"
        ),
        PrimKind::Double => format!(
            "{indent}if (fabs({lhs} - {rhs}) > {macro_prefix}DOUBLE_EPSILON) return 0;"
        ),
        PrimKind::Bool => format!("{indent}if (({lhs} ? 1 : 0) != ({rhs} ? 1 : 0)) return 0;"),
        _ => format!("{indent}if ({lhs} != {rhs}) return 0;"),
    }
}
