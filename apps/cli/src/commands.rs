//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use newsdigest_core::{
    DigestOutput, DigestRequest, Pipeline, ProgressReporter, RunContext,
};
use newsdigest_shared::{
    AppConfig, SourceKind, init_config, load_config, load_config_from, read_api_key,
    validate_llm_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// NewsDigest: summarized news with sentiment analysis on any topic.
#[derive(Parser)]
#[command(
    name = "newsdigest",
    version,
    about = "Summarized news digests with sentiment analysis on any topic.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Config file (defaults to ~/.newsdigest/newsdigest.toml).
    #[arg(long = "config", global = true)]
    pub config_file: Option<PathBuf>,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// News backend selectable on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum SourceArg {
    Feed,
    KeywordApi,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Feed => SourceKind::Feed,
            SourceArg::KeywordApi => SourceKind::KeywordApi,
        }
    }
}

/// Digest output format.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a news digest for a topic.
    Digest {
        /// Topic to search for, e.g. "renewable energy".
        topic: String,

        /// News backend (defaults to the config file's choice).
        #[arg(short, long)]
        source: Option<SourceArg>,

        /// Number of articles, 3 to 10 (defaults to the config file's choice).
        #[arg(short, long)]
        limit: Option<usize>,

        /// What to print on stdout.
        #[arg(short, long, default_value = "markdown")]
        format: OutputFormat,

        /// Also write the report and JSON record into this directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) -> Result<()> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newsdigest=info",
        1 => "newsdigest=debug",
        _ => "newsdigest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout carries the digest itself.
    let (writer, ansi) = match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("cannot open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .init();
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_file.as_deref();
    match cli.command {
        Command::Digest {
            topic,
            source,
            limit,
            format,
            output,
        } => {
            cmd_digest(
                config_path,
                &topic,
                source.map(SourceKind::from),
                limit,
                format,
                output.as_deref(),
            )
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_digest(
    config_path: Option<&Path>,
    topic: &str,
    source: Option<SourceKind>,
    limit: Option<usize>,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    // Validate credentials before any network call
    let config = resolve_config(config_path)?;
    let llm_key = validate_llm_key(&config)?;

    let request = DigestRequest {
        topic: topic.trim().to_string(),
        source: source.unwrap_or(config.defaults.source),
        limit: limit.unwrap_or(config.defaults.limit as usize),
    };

    if request.source == SourceKind::KeywordApi
        && read_api_key(&config.news_api.api_key_env).is_none()
    {
        return Err(eyre!(
            "keyword API key not found. Set the {} environment variable or use --source feed.",
            config.news_api.api_key_env
        ));
    }

    let pipeline = Pipeline::from_config(&config, &llm_key)?;
    let ctx = RunContext::with_tracing();

    info!(
        run_id = %ctx.run_id(),
        topic = %request.topic,
        source = %request.source,
        limit = request.limit,
        "building digest"
    );

    let reporter = CliProgress::new();
    let result = pipeline.run(&request, &ctx, &reporter).await;
    reporter.clear();
    let result = result?;

    report_fallbacks(&result);

    match format {
        OutputFormat::Markdown => println!("{}", result.report),
        OutputFormat::Json => println!("{}", newsdigest_artifacts::render_json(&result.digest)?),
    }

    if let Some(dir) = output {
        let metas = newsdigest_artifacts::write_artifacts(dir, &result.digest, &result.stats)?;
        for meta in &metas {
            eprintln!("  Wrote {} ({} bytes)", dir.join(&meta.filename).display(), meta.size_bytes);
        }
    }

    eprintln!(
        "  {} articles, tone {}, {:.1}s",
        result.digest.total_articles,
        result.stats.tone,
        result.elapsed.as_secs_f64()
    );

    Ok(())
}

/// Tell the user when the articles came from a fallback query.
fn report_fallbacks(output: &DigestOutput) {
    let Some(last) = output.attempts.last() else {
        return;
    };
    if output.attempts.len() > 1 {
        eprintln!(
            "  No articles on the first try; used {} with query '{}'.",
            last.backend, last.query
        );
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn article_enriched(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Processing article [{current}/{total}] {title}"));
    }

    fn done(&self, _output: &DigestOutput) {
        self.spinner.finish_and_clear();
    }
}
