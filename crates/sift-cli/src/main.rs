use anyhow::Context;
use clap::{Parser, Subcommand};
use sift_core::SiftConfig;
use sift_runtime::AskOptions;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_CONFIG: &str = "sift.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "sift",
    version,
    about = "Validate, compile and run analytics Plans against an allowlisted schema"
)]
struct Cli {
    /// Path to the configuration file. Defaults to ./sift.yaml when present.
    #[arg(long, short = 'c', env = "SIFT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect the schema registry.
    Schema {
        #[command(subcommand)]
        cmd: SchemaCommand,
    },

    /// Validate a Plan and print its normalized form.
    Validate {
        /// Plan JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Validate and compile a Plan to parameterized SQL.
    Compile {
        /// Plan JSON file, or `-` for stdin.
        file: PathBuf,

        /// Emit `$n` placeholders and an ordered parameter array.
        #[arg(long, default_value_t = false)]
        positional: bool,
    },

    /// Validate, compile and execute a Plan against the upstream database.
    Run {
        /// Plan JSON file, or `-` for stdin.
        file: PathBuf,

        /// Return sensitive column values instead of redacting them.
        #[arg(long, default_value_t = false)]
        allow_sensitive: bool,

        /// Caller identity recorded in the audit log.
        #[arg(long = "user")]
        user_id: Option<String>,

        /// Question the Plan answers. Only its hash is logged.
        #[arg(long)]
        question: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// List entities, joins and limits.
    List,

    /// Show an entity's columns, types and joins.
    Describe { entity: String },

    /// Compare the registry with the live database.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging.level);

    let registry = config.load_registry().context("Failed to load schema registry")?;
    tracing::debug!(
        version = registry.version(),
        entities = registry.entities().len(),
        "Schema registry loaded"
    );

    match cli.cmd {
        Command::Schema { cmd } => match cmd {
            SchemaCommand::List => commands::schema::list(&registry),
            SchemaCommand::Describe { entity } => commands::schema::describe(&registry, &entity),
            SchemaCommand::Check => commands::schema::check(&config, &registry).await,
        },
        Command::Validate { file } => commands::plan::validate(&registry, &file),
        Command::Compile { file, positional } => {
            commands::plan::compile(&registry, &file, positional)
        }
        Command::Run {
            file,
            allow_sensitive,
            user_id,
            question,
        } => {
            let opts = AskOptions {
                allow_sensitive,
                user_id,
                question,
            };
            commands::run::run(&config, registry, &file, opts).await
        }
    }
}

/// An explicit path must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> anyhow::Result<SiftConfig> {
    match path {
        Some(p) => SiftConfig::load_with_context(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => SiftConfig::load_with_context(DEFAULT_CONFIG)
            .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG)),
        None => Ok(SiftConfig::default()),
    }
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr so command
/// output on stdout stays machine-readable.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
