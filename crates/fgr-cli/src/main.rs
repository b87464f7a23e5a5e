use anyhow::Result;
use clap::{Parser, Subcommand};
use fgr_config::{LogFormat, LoggingSection};

mod commands;

use commands::reconcile::ReconcileArgs;

#[derive(Parser)]
#[command(name = "fgr")]
#[command(about = "Friend group reconciliation", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (later files override earlier ones)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// Fail instead of warn when the config holds keys nothing reads
    #[arg(long, global = true, default_value_t = false)]
    strict_config: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile friend.friend_group_id with group membership
    Reconcile(ReconcileArgs),

    /// Connectivity and table presence
    Status,

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Apply the bundled schema (fresh and test databases)
    Migrate,

    /// Create missing lookup indexes
    EnsureIndexes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = fgr_config::load_layered_yaml(&refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Reconcile(args) => {
            let cfg = commands::load_settings(&cli.config_paths, cli.strict_config)?;
            let mut settings = cfg.settings;
            args.apply_overrides(&mut settings)?;
            init_tracing(&settings.logging);
            commands::warn_unused_keys(&cfg.unused_keys);

            let report =
                commands::reconcile::run(&settings, args.dry_run, cfg.config_hash).await?;
            if args.json {
                println!("{}", report.to_json()?);
            } else {
                for line in report.to_kv_lines() {
                    println!("{line}");
                }
            }
        }

        Commands::Status => {
            let cfg = commands::load_settings(&cli.config_paths, cli.strict_config)?;
            init_tracing(&cfg.settings.logging);
            let pool = commands::connect_store(&cfg.settings).await?;
            let s = fgr_db::status(&pool).await?;
            println!(
                "db_ok={} schema_ready={} missing_tables={}",
                s.ok,
                s.schema_ready(),
                if s.missing_tables.is_empty() {
                    "-".to_string()
                } else {
                    s.missing_tables.join(",")
                }
            );
        }

        Commands::Db { cmd } => {
            let cfg = commands::load_settings(&cli.config_paths, cli.strict_config)?;
            init_tracing(&cfg.settings.logging);
            let pool = commands::connect_store(&cfg.settings).await?;
            match cmd {
                DbCmd::Migrate => {
                    fgr_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
                DbCmd::EnsureIndexes => {
                    let names = fgr_db::ensure_indexes(&pool).await?;
                    for name in &names {
                        println!("index={name}");
                    }
                    println!("indexes_ensured={}", names.len());
                }
            }
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries the report.
fn init_tracing(logging: &LoggingSection) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
