//! docsight CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use docsight::{
    commands::{
        cmd_init, cmd_migrate, cmd_serve, cmd_sql, cmd_status, print_init_report,
        print_init_summary, print_sql_output, print_startup, print_status, print_stop_outcome,
        run_until_shutdown, InitOptions,
    },
    config::Config,
    error::Result,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docsight")]
#[command(version, about = "Sidecar supervisor and local store bootstrap for docsight", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "DOCSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the store
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Bootstrap the store, start the sidecar and supervise it until Ctrl-C
    Serve,

    /// Show store statistics and probe the sidecar
    Status,

    /// Run pending migrations and seed reference data
    Migrate,

    /// Execute SQL against the store
    Sql {
        /// The statement to run
        statement: String,

        /// Positional parameter, parsed as JSON when possible (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Run as a multi-statement script without parameters
        #[arg(long, conflicts_with = "params")]
        raw: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    // Completions need neither config nor store
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "docsight", &mut std::io::stdout());
        return Ok(());
    }

    if let Commands::Init { force } = cli.command {
        let (base_dir, config_path) = init_paths(cli.config.as_deref());
        let summary = cmd_init(InitOptions {
            base_dir,
            config_path,
            force,
        })
        .await?;

        if cli.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_init_summary(&summary);
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Serve => {
            let app = cmd_serve(&config).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&app.sidecar)?);
            } else {
                print_startup(&app);
            }

            let outcome = run_until_shutdown(app).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_stop_outcome(&outcome);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Migrate => {
            let report = cmd_migrate(&config).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_init_report(&report);
            }
        }

        Commands::Sql {
            statement,
            params,
            raw,
        } => {
            let output = cmd_sql(&config, &statement, &params, raw).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_sql_output(&output)?;
            }
        }
    }

    Ok(())
}

/// Base directory and config file for `init`.
///
/// A `.toml` path names the file itself; any other path is a directory.
fn init_paths(path: Option<&Path>) -> (PathBuf, PathBuf) {
    match path {
        Some(path) if path.extension().is_some_and(|ext| ext == "toml") => {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path.to_path_buf())
        }
        Some(dir) => (dir.to_path_buf(), dir.join("config.toml")),
        None => {
            let base = Config::default_base_dir();
            let config = base.join("config.toml");
            (base, config)
        }
    }
}

/// Load the config file, or defaults when none has been written yet
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_from(None),
    }
}
