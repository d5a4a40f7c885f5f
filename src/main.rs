use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use minerstats::config::AppConfig;
use minerstats::domain::{Granularity, PoolCurrent, RigProfile};
use minerstats::rx::{Feed, Item};
use minerstats::services::{LogHelper, MinerStatsError, UserErrorFormatter};
use minerstats::views::{export_csv, TableRow};
use minerstats::Dashboard;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "minerstats",
    version,
    about = "Mining pool profitability, scaled to your rigs"
)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a JSON export into the database root
    Import(ImportArgs),
    /// Print the current profitability table
    Current(CurrentArgs),
    /// Print or export one time series
    History(HistoryArgs),
    /// List rig profiles
    Profiles(UserArgs),
    /// Print watch counters after loading the table once
    Stats(UserArgs),
}

#[derive(Args)]
struct ImportArgs {
    file: PathBuf,
}

#[derive(Args)]
struct UserArgs {
    /// Uid whose profiles, bookmarks and wallets are read
    #[arg(long, default_value = "local")]
    user: String,
}

#[derive(Args)]
struct CurrentArgs {
    #[command(flatten)]
    user: UserArgs,

    /// Keep rows whose "pool - algo" label contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Rig profile uuid; the user's default when omitted
    #[arg(long)]
    profile: Option<String>,

    #[arg(long, default_value_t = 0)]
    page: usize,

    #[arg(long)]
    page_size: Option<usize>,
}

#[derive(Args)]
struct HistoryArgs {
    #[command(flatten)]
    user: UserArgs,

    pool: String,

    /// Algorithm, or coin for coin-focused pools
    target: String,

    #[arg(long, default_value = "per-minute")]
    granularity: Granularity,

    #[arg(long)]
    profile: Option<String>,

    /// Write CSV here instead of printing
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("minerstats=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        LogHelper::log_error_with_context("minerstats", &err);
        eprintln!("{}", UserErrorFormatter::format_for_cli(&err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let dashboard = Dashboard::open(config).await?;

    match cli.command {
        Commands::Import(args) => import(&dashboard, args).await,
        Commands::Current(args) => current(&dashboard, args).await,
        Commands::History(args) => history(&dashboard, args).await,
        Commands::Profiles(args) => profiles(&dashboard, args).await,
        Commands::Stats(args) => stats(&dashboard, args).await,
    }
}

async fn first_value<T: Item>(
    feed: Feed<T>,
    what: &str,
) -> Result<T> {
    match feed.first().await {
        Some(Ok(value)) => Ok(value),
        Some(Err(err)) => Err(anyhow::anyhow!("{what}: {}", err.message())),
        None => anyhow::bail!("{what}: no data"),
    }
}

/// The requested profile, the user's default, or amounts as reported.
async fn resolve_profile(dashboard: &Dashboard, uuid: Option<String>) -> Result<RigProfile> {
    let uuid = match uuid {
        Some(uuid) => Some(uuid),
        None => first_value(dashboard.rig_profiles.default_rig_profile(), "default rig profile").await?,
    };
    let Some(uuid) = uuid else {
        debug!("no rig profile selected, using per base unit amounts");
        return Ok(RigProfile::identity());
    };
    first_value(dashboard.rig_profiles.rig_profile(&uuid), "rig profile")
        .await?
        .ok_or_else(|| MinerStatsError::RigProfileNotFound { uuid }.into())
}

async fn import(dashboard: &Dashboard, args: ImportArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let tree: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", args.file.display()))?;
    dashboard.repository.db.set(&[], tree).await?;
    info!(file = %args.file.display(), "import complete");
    Ok(())
}

fn print_rows(rows: &[TableRow]) {
    println!(
        "{:<32} {:>18} {:>16} {:>8}",
        "name", "profitability", "age", "workers"
    );
    for row in rows {
        let marker = if row.bookmark.is_some() { "*" } else { " " };
        let workers = row
            .pool_worker_proportion
            .map(|p| format!("{:.1}%", p * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{marker}{:<31} {:>18} {:>16} {:>8}",
            row.name,
            row.formatted_value(),
            row.age,
            workers
        );
    }
}

async fn current(dashboard: &Dashboard, args: CurrentArgs) -> Result<()> {
    dashboard.auth.sign_in(args.user.user, "");
    let profile = resolve_profile(dashboard, args.profile).await?;
    dashboard.context.update_rig_profile(Some(profile));
    dashboard.context.update_filter(args.filter);

    let table = dashboard.current_table();
    if let Some(size) = args.page_size {
        table.set_page_size(size);
    }
    table.set_page(args.page);

    let rows = first_value(table.page_rows(), "profitability table").await?;
    let total = first_value(table.page_total(), "profitability table").await?;
    print_rows(&rows);
    println!("{} of {} rows", rows.len(), total);
    Ok(())
}

async fn history(dashboard: &Dashboard, args: HistoryArgs) -> Result<()> {
    dashboard.auth.sign_in(args.user.user, "");
    let profile = resolve_profile(dashboard, args.profile).await?;
    let key = format!("{}/{}", args.pool, args.target);

    let snapshot = first_value(
        dashboard.metrics.profitability_stats(
            Feed::constant(None),
            Feed::constant(RigProfile::identity()),
        ),
        "latest snapshot",
    )
    .await?;
    let current: PoolCurrent = snapshot
        .into_iter()
        .find(|keyed| keyed.key == key)
        .map(|keyed| keyed.current)
        .ok_or_else(|| anyhow::anyhow!("No current record for {key}"))?;

    let series = first_value(
        dashboard.history_panel().series(
            Feed::constant(vec![current]),
            Feed::constant(profile),
            args.granularity,
        ),
        "time series",
    )
    .await?;

    match args.csv {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            export_csv(&series, file)?;
            info!(path = %path.display(), "series exported");
        }
        None => {
            for data in &series {
                println!("{} ({})", data.name, data.key);
                for point in &data.series {
                    println!("  {}  {:.8}", point.name.to_rfc3339(), point.value);
                }
            }
        }
    }
    Ok(())
}

async fn profiles(dashboard: &Dashboard, args: UserArgs) -> Result<()> {
    dashboard.auth.sign_in(args.user, "");
    let profiles = first_value(dashboard.rig_profiles.rig_profiles(), "rig profiles").await?;
    let default = first_value(dashboard.rig_profiles.default_rig_profile(), "default rig profile").await?;

    for (uuid, profile) in &profiles {
        let marker = if default.as_deref() == Some(uuid.as_str()) { "*" } else { " " };
        println!("{marker}{uuid}  {} ({} algorithms)", profile.name, profile.hashrates.len());
    }
    Ok(())
}

async fn stats(dashboard: &Dashboard, args: UserArgs) -> Result<()> {
    dashboard.auth.sign_in(args.user, "");
    dashboard.context.update_rig_profile(Some(RigProfile::identity()));

    let table = dashboard.current_table();
    let mut rows = table.page_rows();
    if let Some(Err(err)) = rows.next().await {
        anyhow::bail!("profitability table: {}", err.message());
    }

    let db = dashboard.repository.adaptor.database();
    println!("live watches:  {}", db.live_watches());
    println!("total watches: {}", db.total_watches());
    println!("live series:   {}", dashboard.metrics.live_series());
    Ok(())
}
