#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the apartment transaction ingestion tool.

use std::time::Instant;

use clap::{Parser, Subcommand};
use duckdb::Connection;
use proptech_database::db::{self, LOCATION_TABLE};
use proptech_geocoder::kakao::KakaoClient;
use proptech_geocoder::resolver::Resolver;
use proptech_geocoder::service_registry::{GeocodingService, find_service};
use proptech_ingest::config::{Config, parse_period, parse_regions};
use proptech_ingest::engine::run_job;
use proptech_ingest::geocode::{FillOptions, fill_locations};
use proptech_ingest::refresh::refresh_api;
use proptech_ingest::{Domain, IngestError, all_sources, trade_tables};
use proptech_source::fetcher::HttpPageFetcher;
use proptech_source::source_def::SourceDefinition;
use proptech_trade_models::YearMonth;

#[derive(Parser)]
#[command(
    name = "proptech_ingest",
    about = "Apartment transaction ingestion tool"
)]
struct Cli {
    /// Ask the serving API to reload once the pipeline succeeds
    #[arg(long, global = true)]
    refresh: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a historical month range, then geocode new buildings
    Backfill {
        /// Which feeds to ingest
        #[arg(long, value_enum, default_value_t = Domain::Sale)]
        domain: Domain,
        /// First month, YYYYMM (overrides `START_YYYYMM`)
        #[arg(long)]
        start: Option<String>,
        /// Last month, YYYYMM (overrides `END_YYYYMM`)
        #[arg(long)]
        end: Option<String>,
        /// Comma-separated region codes (overrides `LAWD_CDS`)
        #[arg(long)]
        lawd: Option<String>,
        /// Skip the geocoding step
        #[arg(long)]
        skip_geocode: bool,
    },
    /// Re-ingest the trailing months, then geocode new buildings
    Daily {
        /// Which feeds to ingest
        #[arg(long, value_enum, default_value_t = Domain::Sale)]
        domain: Domain,
        /// Number of trailing months, current month included (overrides
        /// `DAILY_LOOKBACK_MONTHS`)
        #[arg(long)]
        lookback: Option<u32>,
        /// Comma-separated region codes (overrides `LAWD_CDS`)
        #[arg(long)]
        lawd: Option<String>,
        /// Skip the geocoding step
        #[arg(long)]
        skip_geocode: bool,
    },
    /// Geocode buildings that have no position yet
    Geocode {
        /// Comma-separated region codes (overrides `LAWD_CDS`)
        #[arg(long)]
        lawd: Option<String>,
        /// Identities per committed batch (overrides `GEOCODE_BATCH_SIZE`)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Maximum identities to process in this run
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List all configured transaction feeds
    Sources,
}

/// Geocoding client plus the service settings it was built from.
struct Geocoding {
    service: GeocodingService,
    resolver: Resolver<KakaoClient>,
}

impl Geocoding {
    fn new(config: &Config) -> Result<Self, IngestError> {
        let service = find_service("kakao").ok_or_else(|| IngestError::Unknown {
            kind: "geocoding service",
            id: "kakao".to_string(),
        })?;
        let client = KakaoClient::from_service(&service, config.kakao_key()?)?;
        let resolver = Resolver::for_service(client, &service);
        Ok(Self { service, resolver })
    }

    async fn run(
        &self,
        conn: &mut Connection,
        config: &Config,
        limit: Option<usize>,
    ) -> Result<(), IngestError> {
        let sources = all_sources();
        let options = FillOptions {
            batch_size: config
                .geocode_batch_size
                .unwrap_or_else(|| self.service.batch_size()),
            limit,
        };

        let report = fill_locations(
            conn,
            &self.resolver,
            &trade_tables(&sources),
            &config.lawd_cds,
            options,
        )
        .await?;

        log::info!(
            "Geocoding complete: {} processed, {} upserted, {} failed in {} batch(es)",
            report.processed,
            report.upserted,
            report.failed,
            report.batches
        );
        Ok(())
    }
}

async fn ingest_feeds(
    conn: &mut Connection,
    config: &Config,
    sources: &[SourceDefinition],
    periods: &[YearMonth],
) -> Result<(), IngestError> {
    let service_key = config.service_key()?;
    for source in sources {
        let fetcher = HttpPageFetcher::new(source, service_key)?;
        run_job(conn, source, &fetcher, &config.lawd_cds, periods).await?;
    }
    Ok(())
}

fn log_summary(conn: &Connection, sources: &[SourceDefinition]) -> Result<(), IngestError> {
    let tables = sources
        .iter()
        .map(|s| s.table.as_str())
        .chain(std::iter::once(LOCATION_TABLE));

    for table in tables {
        match db::count_rows(conn, table)? {
            Some(count) => log::info!("{table}: {count} row(s)"),
            None => log::info!("{table}: not created yet"),
        }
    }
    Ok(())
}

/// Runs the selected feeds over `periods`, then geocodes unless skipped.
///
/// Credentials are checked before any network call.
async fn run_pipeline(
    config: &Config,
    domain: Domain,
    periods: &[YearMonth],
    skip_geocode: bool,
) -> Result<(), IngestError> {
    let sources = domain.sources()?;
    config.service_key()?;
    let geocoding = if skip_geocode {
        None
    } else {
        Some(Geocoding::new(config)?)
    };

    let mut conn = db::open(&config.db_path)?;
    ingest_feeds(&mut conn, config, &sources, periods).await?;

    if let Some(geocoding) = &geocoding {
        geocoding.run(&mut conn, config, None).await?;
    }

    log_summary(&conn, &sources)
}

fn list_sources() {
    let sources = all_sources();
    println!("{:<12} {:<16} NAME", "ID", "TABLE");
    println!("{}", "-".repeat(60));
    for source in &sources {
        println!("{:<12} {:<16} {}", source.id(), source.table, source.name());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();
    let cli = Cli::parse();
    let started = Instant::now();

    let config = match cli.command {
        Commands::Sources => {
            list_sources();
            return Ok(());
        }
        Commands::Backfill {
            domain,
            start,
            end,
            lawd,
            skip_geocode,
        } => {
            let mut config = Config::from_env()?;
            if let Some(start) = start {
                config.start = parse_period("--start", &start)?;
            }
            if let Some(end) = end {
                config.end = parse_period("--end", &end)?;
            }
            if let Some(lawd) = lawd {
                config.lawd_cds = parse_regions(&lawd);
            }
            config.validate()?;
            config.validate_range()?;

            let periods = YearMonth::range_inclusive(config.start, config.end);
            log::info!(
                "Backfill {domain:?}: {}..{} for {}",
                config.start,
                config.end,
                config.lawd_cds.join(",")
            );
            run_pipeline(&config, domain, &periods, skip_geocode).await?;
            config
        }
        Commands::Daily {
            domain,
            lookback,
            lawd,
            skip_geocode,
        } => {
            let mut config = Config::from_env()?;
            if let Some(lookback) = lookback {
                config.lookback_months = lookback;
            }
            if let Some(lawd) = lawd {
                config.lawd_cds = parse_regions(&lawd);
            }
            config.validate()?;

            let today = chrono::Local::now().date_naive();
            let periods = YearMonth::trailing(config.lookback_months, today);
            log::info!(
                "Daily {domain:?}: last {} month(s) for {}",
                config.lookback_months,
                config.lawd_cds.join(",")
            );
            run_pipeline(&config, domain, &periods, skip_geocode).await?;
            config
        }
        Commands::Geocode {
            lawd,
            batch_size,
            limit,
        } => {
            let mut config = Config::from_env()?;
            if let Some(lawd) = lawd {
                config.lawd_cds = parse_regions(&lawd);
            }
            if batch_size.is_some() {
                config.geocode_batch_size = batch_size;
            }
            config.validate()?;

            let geocoding = Geocoding::new(&config)?;
            let mut conn = db::open(&config.db_path)?;
            geocoding.run(&mut conn, &config, limit).await?;
            log_summary(&conn, &all_sources())?;
            config
        }
    };

    if cli.refresh {
        refresh_api(config.refresh_url.as_deref(), config.admin_token.as_deref()).await?;
    }

    log::info!(
        "Pipeline finished in {:.1}s",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
