//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Creating the run record and reporting per-postal-code outcomes
//! - Resolving each postal code to a region
//! - Walking result pages and fanning detail fetches out to a bounded pool
//! - Handing finished records to the sink
//!
//! Failures stay inside the postal code or listing they happened in. Only a
//! sink failure ends the run.

use crate::config::{Config, CrawlMode};
use crate::crawler::detail::DetailFetcher;
use crate::crawler::fetcher::HttpContext;
use crate::crawler::listing::{ListingRecord, ListingReference};
use crate::crawler::pins::PinScanner;
use crate::crawler::region::{RegionDescriptor, RegionResolver};
use crate::crawler::walker::{PageWalker, SearchEndpoint};
use crate::output::CrawlReport;
use crate::state::ZipcodeOutcome;
use crate::storage::{RunStatus, SqliteStorage, Storage, StorageError};
use crate::CrawlError;
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use url::Url;

/// Shared handle to the run's storage
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Listings seen and stored for one postal code, and whether anything was
/// blocked on the way
///
/// `found` counts every listing that ended up in the sink, whether this
/// postal code stored it or it was there already.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ZipcodeTally {
    found: u64,
    stored: u64,
    blocked: bool,
}

impl ZipcodeTally {
    fn blocked() -> Self {
        Self {
            blocked: true,
            ..Self::default()
        }
    }

    fn outcome(&self) -> ZipcodeOutcome {
        if self.found > 0 {
            ZipcodeOutcome::Populated
        } else if self.blocked {
            ZipcodeOutcome::Blocked
        } else {
            ZipcodeOutcome::Empty
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    resolver: RegionResolver,
    endpoint: SearchEndpoint,
    http: HttpContext,
    fetcher: DetailFetcher,
    pins: PinScanner,
    run_id: i64,
}

impl Coordinator {
    /// Creates a coordinator writing to the configured SQLite database
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    pub fn new(config: Config, config_hash: &str) -> Result<Self, CrawlError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::with_storage(config, config_hash, Arc::new(Mutex::new(storage)))
    }

    /// Creates a coordinator writing to the given storage
    pub fn with_storage(
        config: Config,
        config_hash: &str,
        storage: SharedStorage,
    ) -> Result<Self, CrawlError> {
        let http = HttpContext::from_config(&config)?;
        let endpoint = SearchEndpoint::from_config(&config.endpoints)?;
        let geography_url = Url::parse(&config.endpoints.geography_url)?;

        let run_id = {
            let mut guard = storage
                .lock()
                .map_err(|e| StorageError::Lock(e.to_string()))?;
            guard.create_run(config_hash)?
        };

        Ok(Self {
            config: Arc::new(config),
            resolver: RegionResolver::new(http.clone(), geography_url),
            fetcher: DetailFetcher::new(http.clone()),
            pins: PinScanner::new(http.clone(), endpoint.clone()),
            endpoint,
            http,
            storage,
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Crawls every postal code in order
    ///
    /// The run is marked completed on success and failed if a fatal error
    /// ends it early.
    pub async fn run(&mut self, zipcodes: &[String]) -> Result<CrawlReport, CrawlError> {
        tracing::info!(
            "Starting crawl run {} over {} postal codes",
            self.run_id,
            zipcodes.len()
        );

        let start_time = Instant::now();
        let mut report = CrawlReport::new(self.run_id);

        if let Err(e) = self.crawl_all(zipcodes, &mut report).await {
            tracing::error!("Crawl run {} failed: {}", self.run_id, e);
            match self.lock_storage() {
                Ok(mut storage) => {
                    if let Err(status_err) = storage.update_run_status(self.run_id, RunStatus::Failed) {
                        tracing::error!("Could not mark run {} failed: {}", self.run_id, status_err);
                    }
                }
                Err(lock_err) => tracing::error!("{}", lock_err),
            }
            return Err(e);
        }

        self.lock_storage()?.complete_run(self.run_id)?;
        report.elapsed = start_time.elapsed();

        let (populated, not_populated) = report.populated_vs_not();
        tracing::info!(
            "Crawl completed: {} records from {} postal codes ({} without listings) in {:?}",
            report.records_stored,
            populated,
            not_populated,
            report.elapsed
        );

        Ok(report)
    }

    async fn crawl_all(
        &self,
        zipcodes: &[String],
        report: &mut CrawlReport,
    ) -> Result<(), CrawlError> {
        for (index, zipcode) in zipcodes.iter().enumerate() {
            tracing::info!("[{}/{}] Crawling postal code {}", index + 1, zipcodes.len(), zipcode);

            let (outcome, stored) = self.crawl_zipcode(zipcode, report).await?;

            tracing::info!("Postal code {}: {} ({} records)", zipcode, outcome, stored);
            self.lock_storage()?
                .record_zipcode(self.run_id, zipcode, outcome, stored)?;
            report.record_zipcode(zipcode, outcome, stored);
        }

        Ok(())
    }

    /// Crawls one postal code
    ///
    /// Returns its outcome and the number of records stored for it. Errors
    /// returned from here are fatal to the run.
    async fn crawl_zipcode(
        &self,
        zipcode: &str,
        report: &mut CrawlReport,
    ) -> Result<(ZipcodeOutcome, u64), CrawlError> {
        let region = match self.resolver.resolve(zipcode).await {
            Ok(Some(region)) => region,
            Ok(None) => {
                tracing::info!("Postal code {}: no region found", zipcode);
                return Ok((ZipcodeOutcome::Unresolved, 0));
            }
            Err(e @ CrawlError::Blocked { .. }) => {
                tracing::warn!("{}", e);
                return Ok((ZipcodeOutcome::Blocked, 0));
            }
            Err(e @ CrawlError::Extraction { .. }) => {
                tracing::warn!("{}", e);
                return Ok((ZipcodeOutcome::Unresolved, 0));
            }
            Err(e) => return Err(e),
        };

        let tally = match self.config.crawler.mode {
            CrawlMode::Detail => self.walk_region(&region, report).await?,
            CrawlMode::Pins => self.scan_region(&region, report).await?,
        };

        if tally.blocked && tally.found > 0 {
            tracing::warn!(
                "Postal code {}: blocked after {} listings, results are partial",
                zipcode,
                tally.found
            );
        }

        Ok((tally.outcome(), tally.stored))
    }

    /// Walks a region's pages and fetches every listing's detail page
    ///
    /// The walk itself is strictly sequential. Detail fetches run on a
    /// `JoinSet` holding at most `detail-workers` tasks; their results are
    /// stored here, on the coordinator task, as they are joined.
    async fn walk_region(
        &self,
        region: &RegionDescriptor,
        report: &mut CrawlReport,
    ) -> Result<ZipcodeTally, CrawlError> {
        let workers = self.config.crawler.detail_workers.max(1) as usize;
        let mut walker = PageWalker::new(self.http.clone(), self.endpoint.clone(), region.clone());
        let mut in_flight: JoinSet<Option<ListingRecord>> = JoinSet::new();
        let mut tally = ZipcodeTally::default();

        loop {
            let reference = match walker.next().await {
                Ok(Some(reference)) => reference,
                Ok(None) => break,
                Err(e) if e.is_contained() => {
                    tracing::warn!("{}", e);
                    tally.blocked = true;
                    break;
                }
                Err(e) => {
                    in_flight.abort_all();
                    return Err(e);
                }
            };

            if self.is_known(&reference, report)? {
                tally.found += 1;
                continue;
            }

            while in_flight.len() >= workers {
                if let Some(joined) = in_flight.join_next().await {
                    self.accept_detail(joined, &mut tally, report)?;
                }
            }

            let fetcher = self.fetcher.clone();
            in_flight.spawn(async move { fetcher.fetch(&reference).await });
        }

        while let Some(joined) = in_flight.join_next().await {
            self.accept_detail(joined, &mut tally, report)?;
        }

        Ok(tally)
    }

    /// Reads a region's map pins and stores them as coordinates-only records
    async fn scan_region(
        &self,
        region: &RegionDescriptor,
        report: &mut CrawlReport,
    ) -> Result<ZipcodeTally, CrawlError> {
        let pins = match self.pins.scan(region).await {
            Ok(pins) => pins,
            Err(e @ CrawlError::Blocked { .. }) => {
                tracing::warn!("{}", e);
                return Ok(ZipcodeTally::blocked());
            }
            Err(e @ CrawlError::Extraction { .. }) => {
                tracing::warn!("{}", e);
                return Ok(ZipcodeTally::default());
            }
            Err(e) => return Err(e),
        };

        let captured_on = Utc::now().date_naive();
        let mut tally = ZipcodeTally::default();

        for pin in &pins {
            if self.is_known(pin, report)? {
                tally.found += 1;
                continue;
            }

            match ListingRecord::from_pin(pin, captured_on) {
                Some(record) => self.store_record(&record, &mut tally, report)?,
                None => report.listings_skipped += 1,
            }
        }

        Ok(tally)
    }

    /// Checks the sink for an already stored listing, if skipping is enabled
    fn is_known(
        &self,
        reference: &ListingReference,
        report: &mut CrawlReport,
    ) -> Result<bool, CrawlError> {
        if !self.config.crawler.skip_known_listings {
            return Ok(false);
        }

        let listing_id = reference.listing_id();
        if self.lock_storage()?.contains_listing(&listing_id)? {
            tracing::debug!("Listing {} already stored, skipping", listing_id);
            report.known_skipped += 1;
            return Ok(true);
        }

        Ok(false)
    }

    fn accept_detail(
        &self,
        joined: Result<Option<ListingRecord>, JoinError>,
        tally: &mut ZipcodeTally,
        report: &mut CrawlReport,
    ) -> Result<(), CrawlError> {
        match joined {
            Ok(Some(record)) => self.store_record(&record, tally, report)?,
            Ok(None) => report.listings_skipped += 1,
            Err(e) => {
                tracing::warn!("Detail worker failed: {}", e);
                report.listings_skipped += 1;
            }
        }
        Ok(())
    }

    fn store_record(
        &self,
        record: &ListingRecord,
        tally: &mut ZipcodeTally,
        report: &mut CrawlReport,
    ) -> Result<(), CrawlError> {
        let stored = self.lock_storage()?.store_listing(record).map_err(|e| {
            tracing::error!("Sink rejected listing {}: {}", record.id, e);
            e
        })?;
        tally.found += 1;

        if stored {
            tracing::debug!("Stored listing {}", record.id);
            tally.stored += 1;
            report.records_stored += 1;
        } else {
            tracing::debug!("Listing {} already stored", record.id);
            report.duplicates_skipped += 1;
        }

        Ok(())
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, dyn Storage + Send + 'static>, CrawlError> {
        self.storage
            .lock()
            .map_err(|e| CrawlError::Storage(StorageError::Lock(e.to_string())))
    }
}

/// Runs a complete crawl against the configured database
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file
/// * `zipcodes` - Postal codes to crawl, in order
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    zipcodes: &[String],
) -> Result<CrawlReport, CrawlError> {
    let mut coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run(zipcodes).await
}
