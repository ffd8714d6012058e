//! Immutable generation settings, threaded explicitly through every stage.
//!
//! Nothing in the pipeline consults ambient state; a single process can run
//! several independent generations with different configs without cross-talk.

use serde::Deserialize;

/// Text-encoding handling for input documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
pub enum EncodingMode {
    /// Sniff the byte prefix (BOMs for UTF-16/32, otherwise UTF-8).
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "utf-8")]
    #[value(name = "utf-8")]
    Utf8,
    /// BOM decides endianness; little-endian when absent.
    #[serde(rename = "utf-16")]
    #[value(name = "utf-16")]
    Utf16,
    #[serde(rename = "utf-32")]
    #[value(name = "utf-32")]
    Utf32,
}

/// Settings recognized by the generator. Loadable from a JSON config file;
/// the CLI overlays its flags on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateConfig {
    pub encoding: EncodingMode,
    /// Include-guard macro for the generated header. Defaults to a name
    /// derived from the output base name.
    pub header_guard: Option<String>,
    pub include_header_for_json_lib: String,
    pub include_header_for_types: String,
    /// Applied to every emitted symbol, e.g. `acme_Point_to_json`.
    pub function_name_prefix: String,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            encoding: EncodingMode::Auto,
            header_guard: None,
            include_header_for_json_lib: "cJSON.h".to_string(),
            include_header_for_types: "mytypes.h".to_string(),
            function_name_prefix: String::new(),
        }
    }
}

impl GenerateConfig {
    /// The include-guard macro to emit: the configured one, or one derived
    /// from the output base name (`my-gen` -> `MY_GEN_H`).
    pub fn header_guard_for(&self, out_stem: &str) -> String {
        if let Some(guard) = &self.header_guard {
            return guard.clone();
        }
        let mut guard: String = out_stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        guard.push_str("_H");
        guard
    }

    /// Prefix for the epsilon override macros in the generated source.
    pub fn macro_prefix(&self) -> String {
        if self.function_name_prefix.is_empty() {
            "AUTOGEN_".to_string()
        } else {
            self.function_name_prefix.to_uppercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_derived_from_stem() {
        let cfg = GenerateConfig::default();
        assert_eq!(cfg.header_guard_for("my-gen.v2"), "MY_GEN_V2_H");
    }

    #[test]
    fn explicit_guard_wins() {
        let cfg = GenerateConfig {
            header_guard: Some("WRAPPERS_H".into()),
            ..GenerateConfig::default()
        };
        assert_eq!(cfg.header_guard_for("anything"), "WRAPPERS_H");
    }

    #[test]
    fn config_file_round_trip() {
        let cfg: GenerateConfig = serde_json::from_str(
            r#"{
                "encoding": "utf-16",
                "header_guard": "G_H",
                "include_header_for_json_lib": "vendor/cJSON.h",
                "function_name_prefix": "acme_"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.encoding, EncodingMode::Utf16);
        assert_eq!(cfg.header_guard.as_deref(), Some("G_H"));
        assert_eq!(cfg.include_header_for_json_lib, "vendor/cJSON.h");
        assert_eq!(cfg.include_header_for_types, "mytypes.h");
        assert_eq!(cfg.macro_prefix(), "ACME_");
    }

    #[test]
    fn unknown_config_key_is_rejected() {
        let err = serde_json::from_str::<GenerateConfig>(r#"{"encodng": "auto"}"#);
        assert!(err.is_err());
    }
}
