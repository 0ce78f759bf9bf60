use std::borrow::Cow;
use std::collections::HashSet;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use layerguard_core::{render_classification, run_detect, run_validate, DetectPlan, EXIT_OK};
use layerguard_diff::{listed_paths, parse_changed_paths};
use layerguard_domain::{classify, enhance, validate, RuleCatalog};
use layerguard_types::{
    ChangeMetadata, ConfigFile, DiffMeta, EnhancedMetadata, DEFAULT_BASE, DEFAULT_HEAD,
    DEFAULT_OUTPUT,
};

mod config_loader;
mod env_expand;

use config_loader::{load_config_with_includes, ConfigFormat};
use env_expand::expand_env_vars;

/// Config files tried, in order, when `--config` is not given.
const CONFIG_CANDIDATES: [&str; 2] = ["layerguard.toml", "config/change-detection-config.yaml"];

const DEFAULT_REPORT: &str = "change-report.md";

#[derive(Parser)]
#[command(name = "layerguard")]
#[command(about = "Map changed files to the infrastructure layers that need deploying", long_about = None)]
struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify changed files and write the deployment metadata document.
    Detect(DetectArgs),

    /// Add condition flags to an existing change metadata document.
    Enhance(EnhanceArgs),

    /// Check a metadata document for internal consistency.
    Validate(ValidateArgs),

    /// Show how each given path is classified.
    Explain(ExplainArgs),

    /// Print the effective configuration after includes are merged.
    Rules(RulesArgs),

    /// Write a starter configuration file.
    Init(InitArgs),
}

#[derive(Parser, Debug)]
struct DetectArgs {
    /// Path to a config file. If omitted, uses ./layerguard.toml or
    /// ./config/change-detection-config.yaml, whichever exists first.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base git ref (defaults to config defaults, else main).
    #[arg(long)]
    base: Option<String>,

    /// Head git ref (defaults to config defaults, else HEAD).
    #[arg(long)]
    head: Option<String>,

    /// Read the changed-path list from a file (or '-' for stdin) instead of git.
    ///
    /// Accepts `git diff --name-only` or `--name-status` output.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["base", "head"])]
    files_from: Option<PathBuf>,

    /// Where to write the metadata document (defaults to config defaults,
    /// else change-metadata.json).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write a Markdown deployment report.
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = DEFAULT_REPORT
    )]
    md: Option<PathBuf>,

    /// Fail (exit 2) when the document is invalid, and require every changed
    /// path to be matched or excluded.
    #[arg(long)]
    strict: bool,

    /// Turn off `strict = true` from the config defaults for this run.
    #[arg(long, conflicts_with = "strict")]
    no_strict: bool,

    /// Changed paths. When given, git is not consulted.
    #[arg(conflicts_with_all = ["base", "head"])]
    paths: Vec<String>,
}

#[derive(Parser, Debug)]
struct EnhanceArgs {
    /// Change metadata document to read.
    #[arg(long)]
    metadata: PathBuf,

    /// Where to write the enhanced document. Prints to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Metadata document to check.
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    metadata: PathBuf,

    /// Also require every changed path to be matched or excluded.
    #[arg(long)]
    strict: bool,

    /// Output format for validation results.
    #[arg(long, value_enum, default_value_t = ValidateFormat::Text)]
    format: ValidateFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ValidateFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
struct ExplainArgs {
    #[arg(long)]
    config: Option<PathBuf>,

    /// Paths to classify.
    #[arg(required = true)]
    paths: Vec<String>,
}

#[derive(Parser, Debug)]
struct RulesArgs {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = RulesFormat::Toml)]
    format: RulesFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RulesFormat {
    Toml,
    Json,
}

#[derive(Parser, Debug)]
struct InitArgs {
    /// Output path. A `.yaml` / `.yml` extension writes YAML instead of TOML.
    #[arg(long, short, default_value = "layerguard.toml")]
    config: PathBuf,

    /// Overwrite an existing file without prompting.
    #[arg(long, short)]
    force: bool,
}

#[cfg(not(test))]
fn main() -> std::process::ExitCode {
    match run_with_args(std::env::args_os()) {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::ExitCode::from(layerguard_core::EXIT_TOOL_ERROR as u8)
        }
    }
}

fn run_with_args<I, T>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Detect(args) => cmd_detect(args),
        Commands::Enhance(args) => {
            cmd_enhance(args)?;
            Ok(EXIT_OK)
        }
        Commands::Validate(args) => cmd_validate(args),
        Commands::Explain(args) => {
            cmd_explain(args)?;
            Ok(EXIT_OK)
        }
        Commands::Rules(args) => {
            cmd_rules(args)?;
            Ok(EXIT_OK)
        }
        Commands::Init(args) => {
            cmd_init(args)?;
            Ok(EXIT_OK)
        }
    }
}

/// Initialize tracing/logging based on CLI flags.
fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("Logging initialized at level: {}", level);
}

fn cmd_detect(args: DetectArgs) -> Result<i32> {
    let config_path = find_config(Path::new(""), args.config.clone())?;
    let cfg = load_config(&config_path)?;
    let catalog = compile_catalog(&cfg, &config_path)?;

    let strict = resolve_strict(&args, &cfg);
    let (paths, diff) = collect_changed_paths(&args, &cfg)?;
    info!("{} changed path(s)", paths.len());

    let plan = DetectPlan { diff, strict };
    let run = run_detect(&plan, &catalog, &paths);

    let out = args.out.clone().unwrap_or_else(|| {
        PathBuf::from(cfg.defaults.output.as_deref().unwrap_or(DEFAULT_OUTPUT))
    });
    write_json(&out, &run.metadata)?;
    info!("Wrote metadata to {}", out.display());

    if let Some(md) = &args.md {
        write_text(md, &run.markdown)?;
        info!("Wrote report to {}", md.display());
    }

    Ok(run.exit_code)
}

/// Command-line flags win over `[defaults] strict`.
fn resolve_strict(args: &DetectArgs, cfg: &ConfigFile) -> bool {
    if args.no_strict {
        false
    } else {
        args.strict || cfg.defaults.strict.unwrap_or(false)
    }
}

/// Changed paths from positional args and/or `--files-from`, else from git.
fn collect_changed_paths(
    args: &DetectArgs,
    cfg: &ConfigFile,
) -> Result<(Vec<String>, Option<DiffMeta>)> {
    if !args.paths.is_empty() || args.files_from.is_some() {
        let mut paths: Vec<String> = listed_paths(&args.paths)
            .into_iter()
            .map(|c| c.path)
            .collect();
        if let Some(source) = &args.files_from {
            let listing = read_listing(source)?;
            let parsed = parse_changed_paths(&listing).context("parse changed-path list")?;
            let mut seen: HashSet<String> = paths.iter().cloned().collect();
            for changed in parsed {
                if seen.insert(changed.path.clone()) {
                    paths.push(changed.path);
                }
            }
        }
        return Ok((paths, None));
    }

    let base = args
        .base
        .clone()
        .or_else(|| cfg.defaults.base.clone())
        .unwrap_or_else(|| DEFAULT_BASE.to_string());
    let head = args
        .head
        .clone()
        .or_else(|| cfg.defaults.head.clone())
        .unwrap_or_else(|| DEFAULT_HEAD.to_string());

    let listing = git_name_status(&base, &head)?;
    let parsed = parse_changed_paths(&listing).context("parse git diff output")?;
    Ok((
        parsed.into_iter().map(|c| c.path).collect(),
        Some(DiffMeta { base, head }),
    ))
}

fn read_listing(source: &Path) -> Result<String> {
    if source.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("read changed paths from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(source)
        .with_context(|| format!("read changed paths from {}", source.display()))
}

fn cmd_enhance(args: EnhanceArgs) -> Result<()> {
    let change: ChangeMetadata = read_json(&args.metadata)?;

    let mut enhanced = enhance(&change);
    let validation = validate(&enhanced, false);
    enhanced.is_valid = Some(validation.is_valid);
    for problem in validation.problems.iter().chain(&validation.warnings) {
        warn!("{problem}");
    }

    match &args.out {
        Some(out) => {
            write_json(out, &enhanced)?;
            info!("Wrote enhanced metadata to {}", out.display());
        }
        None => {
            let s = serde_json::to_string_pretty(&enhanced).context("render json")?;
            println!("{s}");
        }
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<i32> {
    info!("Validating {}", args.metadata.display());

    let metadata: EnhancedMetadata = read_json(&args.metadata)?;
    let run = run_validate(&metadata, args.strict);

    match args.format {
        ValidateFormat::Text => print!("{}", run.text),
        ValidateFormat::Json => {
            let s = serde_json::to_string_pretty(&run.validation).context("render json")?;
            println!("{s}");
        }
    }

    Ok(run.exit_code)
}

fn cmd_explain(args: ExplainArgs) -> Result<()> {
    let config_path = find_config(Path::new(""), args.config)?;
    let cfg = load_config(&config_path)?;
    let catalog = compile_catalog(&cfg, &config_path)?;

    for path in &args.paths {
        println!("{}", render_classification(path, &classify(path, &catalog)));
    }
    Ok(())
}

fn cmd_rules(args: RulesArgs) -> Result<()> {
    let config_path = find_config(Path::new(""), args.config)?;
    let cfg = load_config(&config_path)?;

    match args.format {
        RulesFormat::Toml => {
            let s = toml::to_string_pretty(&cfg).context("render toml")?;
            print!("{s}");
        }
        RulesFormat::Json => {
            let s = serde_json::to_string_pretty(&cfg).context("render json")?;
            println!("{s}");
        }
    }
    Ok(())
}

fn confirm_overwrite<R: BufRead, W: Write>(
    input: &mut R,
    mut err: W,
    output_path: &Path,
) -> Result<bool> {
    write!(
        err,
        "Configuration file '{}' already exists. Overwrite? [y/N] ",
        output_path.display()
    )
    .context("write prompt")?;
    err.flush().context("flush stderr")?;

    let mut input_line = String::new();
    input.read_line(&mut input_line).context("read stdin")?;

    let input = input_line.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

fn cmd_init(args: InitArgs) -> Result<()> {
    let mut input = io::stdin().lock();
    cmd_init_with_io(args, &mut input, io::stderr())
}

fn cmd_init_with_io<R: BufRead, W: Write>(args: InitArgs, input: &mut R, err: W) -> Result<()> {
    let output_path = &args.config;

    if output_path.exists() && !args.force && !confirm_overwrite(input, err, output_path)? {
        println!("Aborted.");
        return Ok(());
    }

    let content = starter_config_text(ConfigFormat::from_path(output_path))?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
    }

    std::fs::write(output_path, content)
        .with_context(|| format!("write {}", output_path.display()))?;

    println!("Created {}.", output_path.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Adjust layers and rules in {} to match your repository",
        output_path.display()
    );
    println!("  2. Run 'layerguard explain <PATH>...' to check how files are classified");
    println!("  3. Run 'layerguard detect --base <REF>' to compute the deployment checklist");

    Ok(())
}

fn starter_config_text(format: ConfigFormat) -> Result<String> {
    let starter = ConfigFile::starter();
    let (header, body) = match format {
        ConfigFormat::Toml => (
            "# layerguard configuration.\n# Rules are tried in order; the first matching rule wins.\n\n",
            toml::to_string_pretty(&starter).context("render toml")?,
        ),
        ConfigFormat::Yaml => (
            "# layerguard configuration.\n# Rules are tried in order; the first matching rule wins.\n",
            serde_yaml::to_string(&starter).context("render yaml")?,
        ),
    };
    Ok(format!("{header}{body}"))
}

/// Resolve the config path: explicit, else the first candidate under `root`
/// that exists.
fn find_config(root: &Path, explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let found = CONFIG_CANDIDATES
        .iter()
        .map(|candidate| root.join(candidate))
        .find(|p| p.exists());

    let Some(path) = found else {
        bail!(
            "No configuration file found. Specify --config or create {} (try 'layerguard init')",
            CONFIG_CANDIDATES[0]
        );
    };
    Ok(path)
}

fn load_config(path: &Path) -> Result<ConfigFile> {
    info!("Loading config from: {}", path.display());

    let cfg = load_config_with_includes(path, |text: &str| {
        expand_env_vars(text).map(Cow::into_owned)
    })?;

    debug!(
        "Loaded {} rule(s), {} layer(s), {} exclusion(s)",
        cfg.rule.len(),
        cfg.layers.len(),
        cfg.exclusions.patterns.len()
    );
    Ok(cfg)
}

fn compile_catalog(cfg: &ConfigFile, path: &Path) -> Result<RuleCatalog> {
    let catalog = RuleCatalog::compile(cfg)
        .with_context(|| format!("invalid config {}", path.display()))?
        .with_source(path.display().to_string());
    debug!(
        "Compiled {} rule(s) across layers: {}",
        catalog.rules().len(),
        catalog.layers().join(", ")
    );
    Ok(catalog)
}

fn git_name_status(base: &str, head: &str) -> Result<String> {
    debug!("git diff --name-status -M {base} {head}");

    let output = Command::new("git")
        .args(["diff", "--name-status", "-M", base, head])
        .output()
        .context("run git diff")?;

    if !output.status.success() {
        bail!(
            "git diff failed (exit={}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse metadata {}", path.display()))
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    let bytes = serde_json::to_vec_pretty(value).context("serialize metadata")?;
    std::fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
