//! Minimal CLI: manifests → (C# source + sidecars | probe encoding)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{LevelFilter, info};

use crate::manifest::ManifestFont;
use crate::subsetter::Subsetter;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile font manifests into C# factories, glyph tables and text encoders
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// log progress (equivalent to RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile every manifest into one C# source file
    Generate(GenerateOut),
    /// encode a text with a manifest's ranges and print the glyph bytes
    Probe(ProbeOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JQ pre-process filter for each document; every result is one manifest.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more manifests. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .cs file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// where `<label>-<property>.bin` payloads go (defaults to the output's directory)
    #[arg(long)]
    sidecar_dir: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ProbeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// text to encode
    #[arg(long, short)]
    text: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Loads every manifest in input order.
    fn load_manifests(&self) -> Result<Vec<ManifestFont>> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut fonts = Vec::new();
        for source_path in source_paths {
            let base_dir = source_path.parent().unwrap_or(Path::new(".")).to_path_buf();
            match self.jq_expr.as_ref() {
                None => {
                    let font = ManifestFont::load(&source_path)
                        .with_context(|| format!("failed to load manifest {}", source_path.display()))?;
                    fonts.push(font);
                }
                Some(jq_expr) => {
                    let source = std::fs::read_to_string(&source_path)
                        .with_context(|| format!("failed to read {}", source_path.display()))?;
                    let json_value = serde_json::from_str::<serde_json::Value>(&source)
                        .with_context(|| format!("failed to parse JSON source file ({})", source_path.display()))?;
                    let documents = crate::jq_exec::run_jq_filter(jq_expr, &json_value).with_context(|| {
                        format!("failed to apply jq expression to source file ({})", source_path.display())
                    })?;
                    for (index, document) in documents.into_iter().enumerate() {
                        let font = ManifestFont::from_value(document, &base_dir).with_context(|| {
                            format!("failed to load manifest #{index} of {}", source_path.display())
                        })?;
                        fonts.push(font);
                    }
                }
            }
        }
        Ok(fonts)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// `RUST_LOG` wins unless `--verbose` is given.
    pub fn init_logging(&self) {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        if self.verbose {
            builder.filter_level(LevelFilter::Debug);
        }
        let _ = builder.try_init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let sidecar_dir = target
                    .sidecar_dir
                    .clone()
                    .or_else(|| target.out.as_ref().and_then(|out| out.parent()).map(Path::to_path_buf))
                    .unwrap_or_default();
                if !sidecar_dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(&sidecar_dir)
                        .with_context(|| format!("failed to create {}", sidecar_dir.display()))?;
                }

                let mut source = String::new();
                for font in target.input_settings.load_manifests()? {
                    let label = font.label().to_string();
                    let compiled = compile_font(font)?;
                    for sidecar in &compiled.sidecars {
                        let path = sidecar
                            .write_to(&sidecar_dir)
                            .with_context(|| format!("failed to write sidecar {}", sidecar.name))?;
                        info!("wrote {} bytes to {}", sidecar.bytes.len(), path.display());
                    }
                    eprintln!(
                        "{} {label} ({} sidecar files)",
                        "compiled".green().bold(),
                        compiled.sidecars.len()
                    );
                    source.push_str(&compiled.source);
                }

                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &source).with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    print!("{source}");
                }
                Ok(())
            }
            Command::Probe(target) => {
                let font = single_manifest(target.input_settings.load_manifests()?)?;
                let label = font.label().to_string();
                let subsetter = add_manifest_ranges(font)?;
                let bytes = subsetter.range_table(&label).encode_text(&target.text)?;
                let hex = bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
                println!("{hex}");
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn single_manifest(fonts: Vec<ManifestFont>) -> Result<ManifestFont> {
    let mut fonts = fonts.into_iter();
    match (fonts.next(), fonts.next()) {
        (Some(font), None) => Ok(font),
        (None, _) => bail!("no manifest to probe"),
        (Some(first), Some(second)) => {
            let labels = [first, second]
                .iter()
                .chain(fonts.as_slice())
                .map(|font| font.label().to_string())
                .collect::<Vec<_>>();
            bail!("probe needs exactly one manifest, the inputs resolve to {}: {}", labels.len(), labels.join(", "))
        }
    }
}

fn add_manifest_ranges(font: ManifestFont) -> Result<Subsetter<ManifestFont>> {
    let label = font.label().to_string();
    let ranges = font.ranges().to_vec();
    let mut subsetter = Subsetter::new(font);
    for range in ranges {
        subsetter
            .add_characters(range.first.0, range.last.0)
            .with_context(|| format!("font {label}"))?;
    }
    Ok(subsetter)
}

fn compile_font(font: ManifestFont) -> Result<crate::subsetter::CompiledFont> {
    let label = font.label().to_string();
    let mut subsetter = add_manifest_ranges(font)?;
    let compiled = subsetter
        .compile(&label)
        .with_context(|| format!("failed to compile font {label}"))?;
    Ok(compiled)
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
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
            let mut matched = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
            if matched.is_empty() {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
            // glob yields alphabetical order; keep it so output is reproducible
            out.append(&mut matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        let paths = resolve_file_path_patterns(["fonts/regular.json", "fonts/bold.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("fonts/regular.json"), PathBuf::from("fonts/bold.json")]);
        assert!(resolve_file_path_patterns(["/nonexistent-cos-codegen-dir/*.json"]).is_err());
    }

    fn manifest(label: &str) -> ManifestFont {
        let value = serde_json::json!({ "label": label, "cmap": {}, "graph": {} });
        ManifestFont::from_value(value, Path::new(".")).unwrap()
    }

    #[test]
    fn exactly_one_manifest_is_required() {
        assert_eq!(single_manifest(vec![manifest("Regular")]).unwrap().label(), "Regular");
        assert!(single_manifest(Vec::new()).is_err());

        let err = single_manifest(vec![manifest("Regular"), manifest("Bold"), manifest("Italic")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "probe needs exactly one manifest, the inputs resolve to 3: Regular, Bold, Italic"
        );
    }

    #[test]
    fn arguments_parse() {
        let cli = CommandLineInterface::try_parse_from([
            "cos-codegen", "-v", "generate", "--input", "a.json", "b.json", "--out", "Fonts.cs",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Generate(target) = &cli.cmd else { panic!("generate expected") };
        assert_eq!(target.input_settings.input, vec!["a.json", "b.json"]);
        assert_eq!(target.out.as_deref(), Some(Path::new("Fonts.cs")));
    }
}
