use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use imf_reader::api::{ApiHttpClient, ApiSource};
use imf_reader::cache::{DiskCache, MemoryCache, TableCache};
use imf_reader::config::{ConfigLoader, ResolvedConfig};
use imf_reader::domain::VersionRequest;
use imf_reader::error::ImfError;
use imf_reader::http::HttpClient;
use imf_reader::output::{OutputFormat, TableOutput};
use imf_reader::registry::WeoRegistry;
use imf_reader::sdr::{Sdr, SdrHttpClient, UnitBasis};
use imf_reader::table::Table;
use imf_reader::weo::{SdmxSource, Weo, WeoHttpClient, WeoSource};

#[derive(Parser)]
#[command(name = "imf-reader")]
#[command(about = "Read IMF World Economic Outlook releases and SDR tables")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand, about = "World Economic Outlook database")]
    Weo(WeoCommand),
    #[command(subcommand, about = "Special Drawing Rights tables")]
    Sdr(SdrCommand),
    #[command(subcommand, about = "Manage the local cache")]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
enum WeoCommand {
    #[command(about = "Fetch one release (defaults to the latest published)")]
    Fetch(WeoFetchArgs),
    #[command(about = "List releases known to the SDMX API, newest first")]
    Versions,
}

#[derive(Args)]
struct WeoFetchArgs {
    /// `latest`, or a release such as "April 2024".
    #[arg(long)]
    version: Option<VersionRequest>,

    /// Where to read the release from.
    #[arg(long, value_enum, default_value = "sdmx")]
    source: SourceArg,

    #[arg(long, value_enum, default_value = "json")]
    format: FormatArg,

    #[arg(long)]
    no_cache: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    /// The release's SDMX bundle (xml + xsd).
    Sdmx,
    /// The SDMX 3.0 REST API.
    Api,
}

#[derive(Subcommand)]
enum SdrCommand {
    #[command(about = "Holdings and allocations for a month (YYYY-MM)")]
    Holdings(HoldingsArgs),
    #[command(about = "Year and month of the latest announcement")]
    LatestDate,
    #[command(about = "SDR valuation history")]
    ExchangeRates(ExchangeRateArgs),
    #[command(about = "SDR interest rate history")]
    InterestRates(FormatArgs),
}

#[derive(Args)]
struct HoldingsArgs {
    #[arg(long)]
    date: Option<String>,

    #[arg(long, value_enum, default_value = "json")]
    format: FormatArg,
}

#[derive(Args)]
struct ExchangeRateArgs {
    #[arg(long, default_value = "SDR")]
    unit: UnitBasis,

    #[arg(long, value_enum, default_value = "json")]
    format: FormatArg,
}

#[derive(Args)]
struct FormatArgs {
    #[arg(long, value_enum, default_value = "json")]
    format: FormatArg,
}

#[derive(Subcommand)]
enum CacheCommand {
    #[command(about = "Remove every cached table")]
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Csv,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ImfError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ImfError) -> u8 {
    match error {
        ImfError::NoData(_) | ImfError::InvalidVersion(_) => 2,
        error if error.is_transport() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Weo(command) => run_weo(command, &config),
        Commands::Sdr(command) => run_sdr(command, &config),
        Commands::Cache(CacheCommand::Clear) => {
            disk_cache(&config)?.clear()?;
            eprintln!("cache cleared");
            Ok(())
        }
    }
}

fn disk_cache(config: &ResolvedConfig) -> Result<DiskCache, ImfError> {
    match &config.cache_dir {
        Some(dir) => Ok(DiskCache::new_with_root(dir.clone())),
        None => DiskCache::new(),
    }
}

fn scoped_cache(config: &ResolvedConfig, scope: &str) -> Result<DiskCache, ImfError> {
    let root: Utf8PathBuf = disk_cache(config)?.root().join(scope);
    Ok(DiskCache::new_with_root(root))
}

fn run_weo(command: WeoCommand, config: &ResolvedConfig) -> miette::Result<()> {
    let http = HttpClient::with_timeout(config.timeout)?;
    match command {
        WeoCommand::Fetch(args) => {
            let table = match args.source {
                SourceArg::Sdmx => {
                    let source = SdmxSource::new(WeoHttpClient::new(http));
                    fetch_weo(source, "weo", &args, config)?
                }
                SourceArg::Api => {
                    let codelists = scoped_cache(config, "codelists")?;
                    let source = ApiSource::new(ApiHttpClient::new(http), codelists)
                        .with_ttl(Some(config.cache_ttl));
                    fetch_weo(source, "weo-api", &args, config)?
                }
            };
            TableOutput::print(&table, args.format.into()).into_diagnostic()
        }
        WeoCommand::Versions => {
            let versions = WeoRegistry::new(ApiHttpClient::new(http)).available_versions()?;
            TableOutput::print_versions(&versions).into_diagnostic()
        }
    }
}

fn fetch_weo<S: WeoSource>(
    source: S,
    scope: &str,
    args: &WeoFetchArgs,
    config: &ResolvedConfig,
) -> Result<Table, ImfError> {
    let request = args.version.unwrap_or(config.weo_version);
    if args.no_cache {
        return Weo::new(source, MemoryCache::new()).fetch_data(request);
    }
    let cache = scoped_cache(config, scope)?;
    Weo::new(source, cache)
        .with_ttl(Some(config.cache_ttl))
        .fetch_data(request)
}

fn run_sdr(command: SdrCommand, config: &ResolvedConfig) -> miette::Result<()> {
    let http = HttpClient::with_timeout(config.timeout)?;
    let sdr = Sdr::new(SdrHttpClient::new(http), scoped_cache(config, "sdr")?)
        .with_ttl(Some(config.cache_ttl));
    match command {
        SdrCommand::Holdings(args) => {
            let date = args.date.as_deref().map(parse_year_month).transpose()?;
            let table = sdr.allocations_holdings(date)?;
            TableOutput::print(&table, args.format.into()).into_diagnostic()
        }
        SdrCommand::LatestDate => {
            let (year, month) = sdr.latest_date()?;
            TableOutput::print_json(&serde_json::json!({ "year": year, "month": month }))
                .into_diagnostic()
        }
        SdrCommand::ExchangeRates(args) => {
            let table = sdr.exchange_rates(args.unit)?;
            TableOutput::print(&table, args.format.into()).into_diagnostic()
        }
        SdrCommand::InterestRates(args) => {
            let table = sdr.interest_rates()?;
            TableOutput::print(&table, args.format.into()).into_diagnostic()
        }
    }
}

fn parse_year_month(raw: &str) -> Result<(i32, u32), ImfError> {
    let invalid = || ImfError::InvalidDate(format!("expected YYYY-MM, got {raw:?}"));
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}
