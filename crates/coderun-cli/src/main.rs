//! Coderun CLI
//!
//! A command-line tool for running solutions against JSON test cases.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coderun::{
    Config, EXAMPLE_CONFIG, Engine, EngineError, ResourceLimits, RunRequest, SupportedLanguage,
    TestCase,
};
use serde_json::Value;
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coderun")]
#[command(about = "Run untrusted solutions against test cases")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: coderun.toml)
        #[arg(short, long, default_value = "coderun.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a solution against test cases and print the graded result
    Test {
        /// Source file holding the solution
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language tag (e.g., python, cpp, objective-c)
        #[arg(short, long)]
        language: String,

        /// JSON file with an array of test cases
        #[arg(long)]
        cases: PathBuf,

        /// CPU time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Wall clock limit in seconds
        #[arg(short, long)]
        wall_time_limit: Option<f64>,

        /// Memory limit in KB
        #[arg(short, long)]
        memory_limit: Option<u64>,
    },

    /// Run a complete program once with JSON input on stdin
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language tag (e.g., python, cpp, objective-c)
        #[arg(short, long)]
        language: String,

        /// JSON input file (default: null)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// List enabled languages
    Languages,

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Test {
            source,
            language,
            cases,
            time_limit,
            wall_time_limit,
            memory_limit,
        } => {
            let limits = ResourceLimits {
                time_limit,
                wall_time_limit,
                memory_limit,
                ..ResourceLimits::unset()
            };
            run_tests(config, &source, &language, &cases, limits).await
        }
        Commands::Run {
            source,
            language,
            input,
        } => run_once(config, &source, &language, input.as_deref()).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_tests(
    config: Config,
    source: &Path,
    language: &str,
    cases_path: &Path,
    limits: ResourceLimits,
) -> Result<()> {
    let language: SupportedLanguage = language.parse()?;
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;
    let cases = tokio::fs::read_to_string(cases_path)
        .await
        .context("failed to read test cases")?;
    let cases: Vec<TestCase> =
        serde_json::from_str(&cases).context("test cases must be a JSON array")?;

    info!(%language, cases = cases.len(), "running tests");
    let engine = Engine::new(config);
    let result = engine
        .submit(RunRequest::new(code, language, cases).with_limits(limits))
        .await;

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("failed to serialize result")?
    );
    info!(
        status = ?result.status,
        passed = result.passed_tests,
        total = result.total_tests,
        time = format_args!("{:.1}ms", result.total_execution_time_ms),
        memory = format_args!("{} KB", result.max_memory_usage_kb),
        "run result"
    );

    if result.all_passed() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

async fn run_once(
    config: Config,
    source: &Path,
    language: &str,
    input: Option<&Path>,
) -> Result<()> {
    let language: SupportedLanguage = language.parse()?;
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;
    let input = match input {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .context("failed to read input file")?;
            serde_json::from_str(&text).context("input file must hold JSON")?
        }
        None => Value::Null,
    };

    info!(%language, "running program");
    let engine = Engine::new(config);
    match engine.run_once(&code, language, &input).await {
        Ok(output) => {
            match &output.output {
                Value::String(text) => println!("{text}"),
                other => println!("{other}"),
            }
            info!(
                time = format_args!("{:.1}ms", output.execution_time_ms),
                memory = format_args!("{} KB", output.memory_usage_kb),
                "execution result"
            );
            Ok(())
        }
        Err(EngineError::Sandbox(e)) => Err(e).context("sandbox failure"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn list_languages(config: &Config) {
    println!("Enabled languages:\n");

    for language in config.enabled_languages() {
        let kind = match config.get_toolchain(language) {
            Ok(toolchain) if toolchain.is_compiled() => "compiled",
            Ok(_) => "interpreted",
            Err(_) => continue,
        };
        println!("  {:<15} {} ({})", language.tag(), language.name(), kind);
    }
}

fn print_limits(limits: &ResourceLimits) {
    println!("  Time limit: {:?} s", limits.time_limit);
    println!("  Wall time limit: {:?} s", limits.wall_time_limit);
    println!("  Memory limit: {:?} KB", limits.memory_limit);
    println!("  Stack limit: {:?} KB", limits.stack_limit);
    println!("  Max processes: {:?}", limits.max_processes);
    println!("  Max output: {:?} KB", limits.max_output);
    println!("  Max open files: {:?}", limits.max_open_files);
}

fn show_config(config: &Config) {
    println!("Default resource limits:");
    print_limits(&config.default_limits);
    println!();
    println!("Compile resource limits:");
    print_limits(&config.compile_limits);
    println!();
    println!("Workspace root: {}", config.workspace_root().display());
    println!("Harness mode: {:?}", config.harness_mode);
    println!("Memory isolation: {:?}", config.memory_isolation);
    println!("Cgroup root: {}", config.cg_root.display());
    println!("Max concurrent runs: {}", config.max_concurrent_runs);
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
