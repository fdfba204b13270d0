use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

mod commands;

use commands::daily::{HistoricalSource, OfficialArgs};

#[derive(Parser)]
#[command(name = "nav")]
#[command(about = "NAV reconciliation engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> account overlay ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Fetch a report period from the reporting API and ingest it
    Fetch {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// mtd | day
        #[arg(long, default_value = "mtd")]
        period: String,

        /// Period end date (default: today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Ingest a CSV export of the historical report
    ImportCsv {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Account the export belongs to
        #[arg(long)]
        account: String,

        /// First day the export covers
        #[arg(long)]
        start: NaiveDate,

        /// Last day the export covers (default: --start)
        #[arg(long)]
        end: Option<NaiveDate>,

        path: PathBuf,
    },

    /// Narrate and reconcile one day from the ledger
    Narrate {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        date: NaiveDate,

        #[command(flatten)]
        officials: OfficialFlags,
    },

    /// Ingest (API or CSV), pull the live session, narrate and reconcile
    RunDaily {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        date: NaiveDate,

        #[command(flatten)]
        officials: OfficialFlags,

        /// Month-to-date CSV export to use instead of the reporting API
        #[arg(long, conflicts_with = "skip_fetch", requires = "account")]
        csv: Option<PathBuf>,

        /// Account for --csv
        #[arg(long)]
        account: Option<String>,

        /// Narrate from the ledger as it is
        #[arg(long, default_value_t = false)]
        skip_fetch: bool,

        /// Also pull today's provisional events from the live session
        #[arg(long, default_value_t = false)]
        live: bool,
    },

    /// Pull the live session's current day
    Live {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Store the provisional events in the ledger
        #[arg(long, default_value_t = false)]
        store: bool,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of a JSONL audit log
    Verify { path: PathBuf },
}

#[derive(clap::Args)]
struct OfficialFlags {
    /// Broker-published closing NAV for --date
    #[arg(long)]
    official_close: Decimal,

    /// Broker-published opening NAV, when available
    #[arg(long)]
    official_open: Option<Decimal>,

    /// Previous trading day's official close (default: stored NAV record)
    #[arg(long)]
    previous_close: Option<Decimal>,
}

impl From<OfficialFlags> for OfficialArgs {
    fn from(f: OfficialFlags) -> Self {
        OfficialArgs {
            official_open: f.official_open,
            official_close: f.official_close,
            previous_close: f.previous_close,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = nav_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = nav_db::status(&pool).await?;
                    println!("db_ok={} has_ledger_table={}", s.ok, s.has_ledger_table);
                }
                DbCmd::Migrate => {
                    nav_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = nav_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Fetch {
            config_paths,
            period,
            date,
        } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            commands::daily::fetch(&config_paths, &period, date).await?;
        }

        Commands::ImportCsv {
            config_paths,
            account,
            start,
            end,
            path,
        } => {
            commands::daily::import_csv(&config_paths, &path, &account, start, end).await?;
        }

        Commands::Narrate {
            config_paths,
            date,
            officials,
        } => {
            commands::daily::narrate(&config_paths, date, officials.into()).await?;
        }

        Commands::RunDaily {
            config_paths,
            date,
            officials,
            csv,
            account,
            skip_fetch,
            live,
        } => {
            let source = match (&csv, &account) {
                _ if skip_fetch => HistoricalSource::Skip,
                (Some(path), Some(account)) => HistoricalSource::Csv { path, account },
                _ => HistoricalSource::Api,
            };
            commands::daily::run_daily(&config_paths, date, source, live, officials.into()).await?;
        }

        Commands::Live {
            config_paths,
            store,
        } => {
            commands::live::live(&config_paths, store).await?;
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => match nav_audit::verify_hash_chain(&path)? {
                nav_audit::VerifyResult::Valid { lines } => {
                    println!("chain_valid=true lines={}", lines);
                }
                nav_audit::VerifyResult::Broken { line, reason } => {
                    println!("chain_valid=false line={}", line);
                    anyhow::bail!("audit chain broken at line {}: {}", line, reason);
                }
            },
        },
    }

    Ok(())
}
