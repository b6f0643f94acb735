use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use texlipse_build::{
    BuildConfig, BuildOutcome, BuildPlan, BuildSessionState, BuildTarget, Builder, LogProjectView,
    MarkerStore, OutputFileManager, RealCommandExecutor, RunnerRegistry, CONFIG_FILE,
};
use texlipse_log::{Diagnostic, FileTrace, FlsAnalyzer, LatexLogAnalyzer, Severity, SCHEMA_VERSION};

/// Rerun flags kept between invocations of `texlipse build`.
const SESSION_FILE: &str = ".texlipse-session.json";

#[derive(Parser)]
#[command(name = "texlipse")]
#[command(about = "Build LaTeX documents and inspect what the tools left behind", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a TeX log file and emit diagnostics and rerun flags as JSON
    Parse {
        /// Path to the .log file
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Column at which the engine wrapped the log
        #[arg(long, default_value_t = texlipse_log::lines::WRAP_WIDTH)]
        wrap_width: usize,
    },
    /// Read a recorder (.fls) file and emit the files it lists as JSON
    Trace {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Project root the names are resolved against
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Build the project's main document
    Build {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Configuration file, defaults to .texlipse.json in the root
        #[arg(long)]
        config: Option<PathBuf>,
        /// Build even if the output is up to date
        #[arg(long)]
        force: bool,
    },
    /// Report the tool chain, runner availability and whether a build is needed
    Check {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a default .texlipse.json
    Init {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Main document, relative to the root
        #[arg(long)]
        main: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct LogReport<'a> {
    schema_version: &'static str,
    diagnostics: Vec<Diagnostic>,
    needs_latex_rerun: bool,
    needs_bib_rerun: bool,
    parsing_stack_error: bool,
    input_files: &'a BTreeSet<String>,
    output_files: &'a BTreeSet<String>,
}

#[derive(Serialize)]
struct TraceReport {
    schema_version: &'static str,
    #[serde(flatten)]
    trace: FileTrace,
    packages: BTreeSet<String>,
    classes: BTreeSet<String>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Parse { path, wrap_width } => {
            let bytes = fs::read(&path).with_context(|| format!("cannot read {}", path.display()))?;
            let content = String::from_utf8_lossy(&bytes);
            let mut analyzer = LatexLogAnalyzer::with_wrap_width(wrap_width);
            let diagnostics = analyzer.parse(&content);
            let report = LogReport {
                schema_version: SCHEMA_VERSION,
                diagnostics,
                needs_latex_rerun: analyzer.needs_latex_rerun(),
                needs_bib_rerun: analyzer.needs_bib_rerun(),
                parsing_stack_error: analyzer.parsing_stack_error(),
                input_files: analyzer.input_files(),
                output_files: analyzer.output_files(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Trace { path, root } => {
            let trace = FlsAnalyzer::new(&root, path).parse()?;
            let (packages, classes) = trace.used_packages();
            let report = TraceReport {
                schema_version: SCHEMA_VERSION,
                trace,
                packages,
                classes,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Build { root, config, force } => build(&root, config.as_deref(), force),
        Commands::Check { root, config } => check(&root, config.as_deref()),
        Commands::Init { root, main } => {
            let path = root.join(CONFIG_FILE);
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            let mut config = BuildConfig::default();
            if let Some(main) = main {
                config.main_file = main;
            }
            config.save(&path)?;
            log::info!("wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(root: &Path, path: Option<&Path>) -> anyhow::Result<BuildConfig> {
    let config = match path {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::load_or_default(root)?,
    };
    config.validate()?;
    Ok(config)
}

fn build(root: &Path, config_path: Option<&Path>, force: bool) -> anyhow::Result<ExitCode> {
    let config = load_config(root, config_path)?;
    let target = BuildTarget::new(root, &config.main_file);
    let session_path = root.join(SESSION_FILE);
    let session = match fs::read_to_string(&session_path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            log::warn!("ignoring {}: {e}", session_path.display());
            BuildSessionState::default()
        }),
        Err(_) => BuildSessionState::default(),
    };
    if !force && !OutputFileManager::new(&config, &target).needs_build(&session)? {
        log::info!("{} is up to date", target.source().display());
        return Ok(ExitCode::SUCCESS);
    }

    let registry = RunnerRegistry::with_defaults(&config);
    let executor = RealCommandExecutor;
    let mut builder = Builder::new(&registry, &executor, &config, root).with_session(session);

    let mut markers = MarkerStore::new();
    let outcome = builder.build(&mut markers, &mut LogProjectView)?;
    fs::write(&session_path, serde_json::to_string_pretty(builder.session())?)
        .with_context(|| format!("cannot write {}", session_path.display()))?;

    for (origin, diagnostic) in markers.iter() {
        let location = match (&diagnostic.file, diagnostic.line) {
            (Some(file), Some(line)) => format!("{file}:{line}: "),
            (Some(file), None) => format!("{file}: "),
            _ => String::new(),
        };
        let severity = match diagnostic.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Layout => "layout",
        };
        println!("{location}{severity}: {} [{origin}]", diagnostic.message);
    }

    match outcome {
        BuildOutcome::Completed { passes, errors } => {
            println!(
                "{} pass(es), {} error(s), {} warning(s)",
                passes,
                errors,
                markers.count(Severity::Warning)
            );
            Ok(if errors > 0 || markers.count(Severity::Error) > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        BuildOutcome::Stopped => {
            println!("stopped");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check(root: &Path, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = load_config(root, config_path)?;
    let registry = RunnerRegistry::with_defaults(&config);
    let plan = BuildPlan::for_format(config.output_format, config.builder_index)?;
    plan.validate()?;
    let chain = plan.resolve(&registry)?;

    println!("main file:  {}", config.main_file.display());
    println!("tool chain: {}", plan.describe(&registry));
    let mut usable = true;
    for (id, runner) in registry.iter() {
        let status = match runner.validate() {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                if chain.contains(&id) {
                    usable = false;
                }
                e.to_string()
            }
        };
        println!("  {:<18} {:<40} {}", runner.name(), runner.program().display(), status);
    }

    let target = BuildTarget::new(root, &config.main_file);
    let manager = OutputFileManager::new(&config, &target);
    let state = if manager.is_up_to_date()? { "up to date" } else { "needs a build" };
    println!("{}: {state}", manager.output_path().display());

    Ok(if usable { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
