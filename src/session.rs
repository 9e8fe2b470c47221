use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::RecordStore;
use crate::driver::{BrowserDriver, Target};
use crate::error::{ExtractionError, SessionError, StoreError};
use crate::extractor::ListingExtractor;
use crate::models::EmployerRecord;
use crate::pagination::{Advance, PaginationController};

/// Title substrings that exclude a job from storage. Case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct BlockList {
    terms: Vec<String>,
}

impl BlockList {
    pub fn new(terms: &[String]) -> Self {
        Self {
            terms: terms.iter().filter(|t| !t.is_empty()).cloned().collect(),
        }
    }

    /// First configured term found in `title`.
    pub fn matching_term(&self, title: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|term| title.contains(term.as_str()))
            .map(String::as_str)
    }
}

/// What happened to one job card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOutcome {
    Saved,
    /// Already stored, or ignored by the store as a duplicate.
    Duplicate,
    Blocked,
    Failed,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub pages: u32,
    pub listings_seen: usize,
    pub jobs_added: usize,
    pub employers_added: usize,
    pub duplicates: usize,
    pub blocked: usize,
    pub failed: usize,
    pub rejected: usize,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            started_at: Local::now(),
            pages: 0,
            listings_seen: 0,
            jobs_added: 0,
            employers_added: 0,
            duplicates: 0,
            blocked: 0,
            failed: 0,
            rejected: 0,
        }
    }
}

impl RunSummary {
    fn record(&mut self, outcome: ListingOutcome) {
        self.listings_seen += 1;
        match outcome {
            ListingOutcome::Saved => self.jobs_added += 1,
            ListingOutcome::Duplicate => self.duplicates += 1,
            ListingOutcome::Blocked => self.blocked += 1,
            ListingOutcome::Failed => self.failed += 1,
            ListingOutcome::Rejected => self.rejected += 1,
        }
    }

    fn log(&self) {
        let elapsed = Local::now().signed_duration_since(self.started_at);
        info!(
            pages = self.pages,
            seen = self.listings_seen,
            added = self.jobs_added,
            employers = self.employers_added,
            duplicates = self.duplicates,
            blocked = self.blocked,
            failed = self.failed,
            rejected = self.rejected,
            elapsed_secs = elapsed.num_seconds(),
            "scrape finished"
        );
    }
}

/// One end-to-end search: submit criteria, then extract and paginate until
/// the results run out. The browser is released on every exit path.
pub struct SearchSession<'a, D: BrowserDriver, S: RecordStore> {
    config: &'a Config,
    driver: D,
    store: &'a S,
    extractor: ListingExtractor<'a>,
    blocklist: BlockList,
}

impl<'a, D: BrowserDriver, S: RecordStore> SearchSession<'a, D, S> {
    pub fn new(config: &'a Config, driver: D, store: &'a S) -> Self {
        Self {
            config,
            driver,
            store,
            extractor: ListingExtractor::new(&config.selectors, &config.listing_base_url),
            blocklist: BlockList::new(&config.blocked_terms),
        }
    }

    pub async fn run(self) -> Result<RunSummary, SessionError> {
        info!(
            keywords = %self.config.search.keywords,
            region = %self.config.search.region,
            "scraper running"
        );
        let mut summary = RunSummary::default();
        let outcome = self.drive(&mut summary).await;

        if let Err(e) = &outcome {
            error!(error = %e, "search session aborted");
        }
        summary.log();

        match self.driver.close().await {
            Ok(()) => info!("browser session closed"),
            Err(e) => warn!(error = %e, "failed to close browser session"),
        }

        outcome.map(|()| summary)
    }

    async fn drive(&self, summary: &mut RunSummary) -> Result<(), SessionError> {
        let search = &self.config.search;
        let selectors = &self.config.selectors;

        self.driver.navigate(&search.base_url).await?;

        let keyword_input = Target::css(selectors.keyword_input.clone());
        self.fill_or_warn(keyword_input, &search.keywords, "keyword input")
            .await;
        match self.driver.find_all(&selectors.location_input).await?.into_iter().next() {
            Some(input) => {
                self.fill_or_warn(Target::Element(input), &search.region, "location input")
                    .await
            }
            None => warn!("location input not found, searching without region"),
        }
        if let Err(e) = self
            .driver
            .click(&Target::css(selectors.search_button.clone()))
            .await
        {
            warn!(error = %e, "search button click failed");
        }

        let mut pager = PaginationController::new(selectors, self.config.pagination);
        loop {
            let page = pager.current_page().unwrap_or(1);
            summary.pages += 1;

            self.scroll_or_warn(&Target::css(selectors.pagination_list.clone()))
                .await;
            let cards = self.driver.find_all(&selectors.job_cards).await?;
            info!(page, listings = cards.len(), "processing results page");

            for (index, card) in cards.iter().enumerate() {
                let outcome = self.process_listing(index + 1, card, summary).await?;
                summary.record(outcome);
            }

            match pager.advance(&self.driver).await? {
                Advance::Next { .. } => continue,
                Advance::Exhausted => break,
            }
        }
        debug!(state = ?pager.state(), "pagination finished");
        Ok(())
    }

    /// Handle one card. A lost browser or a failed store lookup is escalated;
    /// every other problem is logged and the card skipped.
    async fn process_listing(
        &self,
        card_no: usize,
        card: &D::Element,
        summary: &mut RunSummary,
    ) -> Result<ListingOutcome, SessionError> {
        debug!(card = card_no, "inspecting listing");

        let external_id = match self.extractor.listing_id(&self.driver, card).await {
            Ok(id) => id,
            Err(ExtractionError::Driver(e)) => return Err(e.into()),
            Err(e) => {
                warn!(card = card_no, error = %e, "skipping listing");
                return Ok(ListingOutcome::Failed);
            }
        };
        if !self.store.is_new_job(&external_id)? {
            info!(card = card_no, %external_id, "repeat job found, skip");
            return Ok(ListingOutcome::Duplicate);
        }

        let target = Target::Element(card.clone());
        self.scroll_or_warn(&target).await;
        if let Err(e) = self.driver.click(&target).await {
            warn!(card = card_no, error = %e, "could not open listing, skip");
            return Ok(ListingOutcome::Failed);
        }

        let record = match self
            .extractor
            .extract(&self.driver, card, external_id.clone())
            .await
        {
            Ok(record) => record,
            Err(ExtractionError::Driver(e)) => return Err(e.into()),
            Err(e) => {
                warn!(card = card_no, %external_id, error = %e, "extraction failed, skip");
                return Ok(ListingOutcome::Failed);
            }
        };

        if self.store.is_new_employer(&record.company)? {
            let employer = EmployerRecord {
                company: record.company.clone(),
                region: self.config.search.employer_region.clone(),
            };
            match self.store.add_employer(&employer) {
                Ok(true) => {
                    summary.employers_added += 1;
                    info!(company = %employer.company, region = %employer.region, "employer added");
                }
                Ok(false) => {}
                Err(e) => warn!(company = %employer.company, error = %e, "employer not stored"),
            }
        }

        if let Some(term) = self.blocklist.matching_term(&record.title) {
            debug!(title = %record.title, term, "blocked term found, skip");
            return Ok(ListingOutcome::Blocked);
        }

        if let Err(e) = record.validate() {
            warn!(card = card_no, %external_id, error = %e, "listing not stored");
            return Ok(ListingOutcome::Rejected);
        }

        match self.store.add_job(&record) {
            Ok(true) => {
                info!(
                    company = %record.company,
                    title = %record.title,
                    location = %record.location,
                    "job added"
                );
                Ok(ListingOutcome::Saved)
            }
            Ok(false) => Ok(ListingOutcome::Duplicate),
            Err(StoreError::Rejected(field)) => {
                warn!(%external_id, %field, "listing rejected by store");
                Ok(ListingOutcome::Rejected)
            }
            Err(e) => {
                error!(%external_id, error = %e, "failed to store job, skip");
                Ok(ListingOutcome::Failed)
            }
        }
    }

    async fn fill_or_warn(&self, target: Target<D::Element>, text: &str, name: &str) {
        match self.driver.fill(&target, text).await {
            Ok(()) => debug!(element = name, "filled element"),
            Err(e) => warn!(element = name, error = %e, "fill failed"),
        }
    }

    async fn scroll_or_warn(&self, target: &Target<D::Element>) {
        if let Err(e) = self.driver.scroll_into_view(target).await {
            warn!(element = %target, error = %e, "could not scroll into view");
        }
    }
}
