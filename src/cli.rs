//! Minimal CLI: generate | check
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::config::{EncodingMode, GenerateConfig};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate C JSON wrappers from layout JSON, or just validate the inputs
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// load, validate, resolve, and write the header/source pair
    Generate(GenerateOut),
    /// load, validate, and resolve only; print the emission order
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// Root type name (repeat to export multiple roots; defaults to the
    /// only struct if the inputs declare exactly one)
    #[arg(long)]
    root: Vec<String>,

    /// JSON config file ({"encoding": ..., "header_guard": ..., ...});
    /// command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// input text encoding
    #[arg(long, value_enum)]
    encoding: Option<EncodingMode>,

    /// include-guard macro for the generated header
    #[arg(long)]
    header_guard: Option<String>,

    /// header to #include for the JSON library
    #[arg(long)]
    json_include: Option<String>,

    /// header to #include for the struct definitions
    #[arg(long)]
    types_include: Option<String>,

    /// prefix applied to every emitted function name
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Args, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// basename for the generated .h/.c pair
    #[arg(short, long, default_value = "generated_json")]
    out_base: PathBuf,
}

#[derive(Args, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_config(&self) -> anyhow::Result<GenerateConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => GenerateConfig::default(),
        };
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if let Some(guard) = &self.header_guard {
            config.header_guard = Some(guard.clone());
        }
        if let Some(include) = &self.json_include {
            config.include_header_for_json_lib = include.clone();
        }
        if let Some(include) = &self.types_include {
            config.include_header_for_types = include.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.function_name_prefix = prefix.clone();
        }
        Ok(config)
    }

    fn read_documents(&self) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        let source_paths =
            resolve_file_path_patterns(&self.input).context("failed to resolve input paths")?;
        let mut documents = Vec::with_capacity(source_paths.len());
        for path in source_paths {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read input file {}", path.display()))?;
            documents.push((path.to_string_lossy().to_string(), bytes));
        }
        Ok(documents)
    }

    fn run_pipeline(&self, out_stem: &str) -> anyhow::Result<crate::Generation> {
        let config = self.load_config()?;
        let documents = self.read_documents()?;
        Ok(crate::generate(&documents, &self.root, out_stem, &config)?)
    }

    fn run_check(&self) -> anyhow::Result<crate::Resolution> {
        let config = self.load_config()?;
        let documents = self.read_documents()?;
        Ok(crate::check(&documents, &self.root, &config)?)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                let stem = out_stem(&target.out_base)?;
                let generation = target.input_settings.run_pipeline(&stem)?;

                // Both files are fully rendered before either write; a
                // failed run leaves nothing behind.
                let h_path = target.out_base.with_extension("h");
                let c_path = target.out_base.with_extension("c");
                if let Some(parent) = target.out_base.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create output directory {}", parent.display())
                    })?;
                }
                std::fs::write(&h_path, &generation.header)
                    .with_context(|| format!("failed to write {}", h_path.display()))?;
                std::fs::write(&c_path, &generation.source)
                    .with_context(|| format!("failed to write {}", c_path.display()))?;

                eprintln!("Wrote: {}, {}", h_path.display(), c_path.display());
                report_order(&generation.order);
                Ok(())
            }
            Command::Check(target) => {
                let resolution = target.input_settings.run_check()?;
                report_order(&resolution.order);
                Ok(())
            }
        }
    }
}

fn report_order(order: &[String]) {
    eprintln!("Types emitted (dependency order):");
    for name in order {
        eprintln!(" - {name}");
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn out_stem(out_base: &Path) -> anyhow::Result<String> {
    out_base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .context("--out-base has no file name")
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
