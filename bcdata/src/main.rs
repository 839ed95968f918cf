//! Point d'entrée CLI pour bcdata

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use bcdata::cli::{self, App, Commands};
use bcdata::{Config, MirrorStatus};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Télécharger les couches du BC Data Catalogue
#[derive(Parser)]
#[command(name = "bcdata")]
#[command(author, version)]
#[command(about = "Download BC Data Catalogue layers to GeoJSON or PostgreSQL")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier de configuration JSON (défaut : env BCDATA_CONFIG)
    #[arg(long, global = true, env = "BCDATA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    let config = Config::resolve(cli.config.as_deref())?;
    debug!(config = ?config, "Configuration loaded");
    let app = App::new(config)?;

    match cli.command {
        Commands::List { refresh } => {
            cli::cmd_list(&app, refresh).await?;
        }
        Commands::Info {
            dataset,
            indent,
            count,
            name,
        } => {
            cli::cmd_info(&app, &dataset, indent, count, name).await?;
        }
        Commands::Dump {
            dataset,
            query,
            out_file,
            crs,
        } => {
            cli::cmd_dump(&app, &dataset, &query, out_file, crs).await?;
        }
        Commands::Bc2pg(args) => {
            let report = cli::cmd_bc2pg(&app, &args).await?;
            if report.status == MirrorStatus::Failed {
                anyhow::bail!("{}", report.summary());
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout est réservé aux données (dump, info, list)
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
