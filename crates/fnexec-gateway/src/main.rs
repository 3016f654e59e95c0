//! fnexec - function executor service

use clap::{Parser, Subcommand};
use fnexec_core::{BindMode, GatewayConfig, RuntimeConfig, StorageDriver};
use fnexec_gateway::{start_gateway, ExtendedConfig};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fnexec", about = "Function executor: syncs function bundles and runs them on demand")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, default_value = "8000")]
    port: u16,
    #[arg(short, long, default_value = "lan")]
    bind: String,
    /// TOML config file (defaults apply to anything it leaves out)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Root working directory (slots, cache, executions)
    #[arg(long)]
    root: Option<PathBuf>,
    /// Where function archives are pulled from (directory or s3:// URL)
    #[arg(long)]
    functions_location: Option<String>,
    /// Where execution logs are archived (directory or s3:// URL)
    #[arg(long)]
    logs_location: Option<String>,
    /// local | s3
    #[arg(long)]
    storage_driver: Option<String>,
    /// Route prefix of the control surface
    #[arg(long)]
    prefix: Option<String>,
    /// Also write the service log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the executor (default)
    Serve,
    /// Print the effective runtime config as TOML
    Config,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("fnexec v{}", env!("CARGO_PKG_VERSION"));
        }

        Some(Commands::Config) => {
            print!("{}", resolve_runtime_config(&cli).to_toml()?);
        }

        Some(Commands::Serve) | None => {
            let _guard = init_tracing(cli.log_file.as_deref());
            let config = ExtendedConfig {
                gateway: GatewayConfig {
                    port: cli.port,
                    bind: BindMode::parse(&cli.bind),
                },
                runtime: resolve_runtime_config(&cli),
            };
            start_gateway(config).await?;
        }
    }

    Ok(())
}

/// Defaults, then the config file, then the environment, then flags.
fn resolve_runtime_config(cli: &Cli) -> RuntimeConfig {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load(path),
        None => RuntimeConfig::default(),
    }
    .with_env(|key| std::env::var(key).ok());

    if let Some(root) = &cli.root {
        config.run_directory = root.clone();
    }
    if let Some(location) = &cli.functions_location {
        config.functions_location = location.clone();
    }
    if let Some(location) = &cli.logs_location {
        config.logs_location = location.clone();
    }
    if let Some(driver) = &cli.storage_driver {
        config.storage_driver = StorageDriver::parse(driver);
    }
    if let Some(prefix) = &cli.prefix {
        config.executor.route_prefix = prefix.clone();
    }
    config
}

/// Console logging, plus a plain-text file when `log_file` is given. The
/// returned guard flushes the file writer and must live until exit.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (file_writer, guard) = match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let name = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("fnexec.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fnexec=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    guard
}
