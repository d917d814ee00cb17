use clap::{Parser, Subcommand};
use songplay_warehouse::config::{Config, DEFAULT_CONFIG_PATH};
use songplay_warehouse::pipeline::{self, StageReport};
use songplay_warehouse::warehouse::{LocalDatabase, Target};
use songplay_warehouse::{etl, logging};
use std::path::PathBuf;
use tracing::info;

#[cfg(feature = "redshift")]
use songplay_warehouse::warehouse::RedshiftWarehouse;

/// Config file location when --config is not given
const CONFIG_ENV: &str = "DWH_CONFIG";

#[derive(Parser)]
#[command(name = "songplay_warehouse")]
#[command(about = "Create and load the songplay star schema")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file (default: $DWH_CONFIG or dwh.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop every table, then create the schema again
    CreateTables {
        #[arg(long, value_enum, default_value_t = Target::Redshift)]
        target: Target,
    },
    /// Load source data into the fact and dimension tables
    Etl {
        #[arg(long, value_enum, default_value_t = Target::Redshift)]
        target: Target,
        /// Song metadata directory (local target; overrides [local].song_data)
        #[arg(long)]
        song_data: Option<PathBuf>,
        /// Event log directory (local target; overrides [local].log_data)
        #[arg(long)]
        log_data: Option<PathBuf>,
    },
    /// Print row counts of the fact and dimension tables
    Counts {
        #[arg(long, value_enum, default_value_t = Target::Redshift)]
        target: Target,
    },
}

fn print_reports(reports: &[StageReport]) {
    for report in reports {
        info!(
            "{} finished: {} statements, {} rows in {:.2}s",
            report.stage.name(),
            report.statements_executed,
            report.rows_affected,
            report.duration.as_secs_f64()
        );
        println!("✅ {}", report.stage.status_line());
    }
}

fn print_counts(counts: &[(&str, i64)]) {
    for (table, count) in counts {
        println!("   {table}: {count}");
    }
}

#[cfg(feature = "redshift")]
async fn connect_redshift(config: &Config) -> anyhow::Result<RedshiftWarehouse> {
    Ok(RedshiftWarehouse::connect(config.cluster()?).await?)
}

#[cfg(not(feature = "redshift"))]
fn redshift_unavailable() -> anyhow::Error {
    anyhow::anyhow!("this binary was built without the `redshift` feature")
}

async fn create_tables(config: &Config, target: Target) -> anyhow::Result<()> {
    match target {
        Target::Local => {
            let mut db = LocalDatabase::open(&config.local()?.database_path)?;
            let outcome = pipeline::reset_schema(&mut db).await;
            let closed = db.close();
            print_reports(&outcome?);
            closed?;
        }
        Target::Redshift => {
            #[cfg(feature = "redshift")]
            {
                let mut warehouse = connect_redshift(config).await?;
                let outcome = pipeline::reset_schema(&mut warehouse).await;
                let closed = warehouse.close().await;
                print_reports(&outcome?);
                closed?;
            }
            #[cfg(not(feature = "redshift"))]
            {
                return Err(redshift_unavailable());
            }
        }
    }
    Ok(())
}

async fn run_etl(
    config: &Config,
    target: Target,
    song_data: Option<PathBuf>,
    log_data: Option<PathBuf>,
) -> anyhow::Result<()> {
    match target {
        Target::Local => {
            let local = config.local()?;
            let song_dir = song_data.unwrap_or_else(|| local.song_data.clone());
            let log_dir = log_data.unwrap_or_else(|| local.log_data.clone());

            let db = LocalDatabase::open(&local.database_path)?;
            let outcome = etl::process_data(&db, &song_dir, &log_dir);
            let closed = db.close();
            let summary = outcome?;
            closed?;

            println!(
                "✅ Finish loading {} song files and {} log files ({} songplays, {} unresolved)",
                summary.song_files,
                summary.log_files,
                summary.songplays_inserted,
                summary.unresolved_songplays
            );
        }
        Target::Redshift => {
            #[cfg(feature = "redshift")]
            {
                let cloud = config.cloud()?;
                let mut warehouse = RedshiftWarehouse::connect(cloud.cluster).await?;
                let outcome = pipeline::load_and_transform(&mut warehouse, &cloud).await;
                let closed = warehouse.close().await;
                print_reports(&outcome?);
                closed?;
            }
            #[cfg(not(feature = "redshift"))]
            {
                return Err(redshift_unavailable());
            }
        }
    }
    Ok(())
}

async fn show_counts(config: &Config, target: Target) -> anyhow::Result<()> {
    match target {
        Target::Local => {
            let mut db = LocalDatabase::open(&config.local()?.database_path)?;
            let outcome = pipeline::table_counts(&mut db).await;
            let closed = db.close();
            print_counts(&outcome?);
            closed?;
        }
        Target::Redshift => {
            #[cfg(feature = "redshift")]
            {
                let mut warehouse = connect_redshift(config).await?;
                let outcome = pipeline::table_counts(&mut warehouse).await;
                let closed = warehouse.close().await;
                print_counts(&outcome?);
                closed?;
            }
            #[cfg(not(feature = "redshift"))]
            {
                return Err(redshift_unavailable());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    info!("Using configuration {}", config_path.display());
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::CreateTables { target } => {
            println!("🔄 Resetting {target} schema...");
            create_tables(&config, target).await?;
        }
        Commands::Etl {
            target,
            song_data,
            log_data,
        } => {
            println!("🚀 Running {target} ETL...");
            run_etl(&config, target, song_data, log_data).await?;
        }
        Commands::Counts { target } => {
            println!("📊 Row counts for {target}:");
            show_counts(&config, target).await?;
        }
    }
    Ok(())
}
