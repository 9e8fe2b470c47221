//! Scripted browser and recording store for exercising the scraper offline.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Selectors;
use crate::db::RecordStore;
use crate::driver::{BrowserDriver, Target};
use crate::error::{DriverError, StoreError};
use crate::models::{EmployerRecord, ListingRecord};

#[derive(Debug, Clone, Default)]
pub struct FakeCard {
    pub id: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub unclickable: bool,
}

impl FakeCard {
    pub fn new(id: &str, title: &str, company: &str, location: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            company: Some(company.to_string()),
            title: Some(title.to_string()),
            location: Some(location.to_string()),
            unclickable: false,
        }
    }
}

/// How the control for a page is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageControl {
    Direct,
    Expansion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeElement {
    Card(usize),
    Input(String),
    Control(String),
}

#[derive(Default)]
pub struct FakePage {
    pub pages: Vec<Vec<FakeCard>>,
    /// Control style for reaching page `index + 2`.
    pub controls: Vec<PageControl>,
    pub current: usize,
    pub calls: Vec<String>,
    pub closed: bool,
    pub fail_navigation: bool,
    pub fail_listing_query_on_page: Option<usize>,
    pub broken_page_controls: bool,
    pub missing_location_input: bool,
    /// Browser gone: lookups and actions fail from now on.
    pub disconnected: bool,
    /// Drop the browser right after the card query on this page (1-based).
    pub disconnect_after_listing_query_on_page: Option<usize>,
}

#[derive(Clone)]
pub struct FakeDriver {
    selectors: Selectors,
    page: Arc<Mutex<FakePage>>,
}

impl FakeDriver {
    /// One entry per results page; every page is reached through `controls`.
    pub fn new(pages: Vec<Vec<FakeCard>>, controls: Vec<PageControl>) -> Self {
        Self {
            selectors: Selectors::default(),
            page: Arc::new(Mutex::new(FakePage {
                pages,
                controls,
                ..FakePage::default()
            })),
        }
    }

    pub fn single_page(cards: Vec<FakeCard>) -> Self {
        Self::new(vec![cards], Vec::new())
    }

    pub fn state(&self) -> MutexGuard<'_, FakePage> {
        self.page.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn card(&self, index: usize) -> FakeElement {
        FakeElement::Card(index)
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }

    fn check_connected(&self) -> Result<(), DriverError> {
        if self.state().disconnected {
            return Err(DriverError::Session("chrome not reachable".to_string()));
        }
        Ok(())
    }

    fn card_field(&self, card: &FakeCard, selector: &str) -> Option<String> {
        if selector == self.selectors.company {
            card.company.clone()
        } else if selector == self.selectors.job_title {
            card.title.clone()
        } else if selector == self.selectors.job_location {
            card.location.clone()
        } else {
            None
        }
    }

    /// Page number a control selector leads to, if it is currently rendered.
    fn control_target(&self, selector: &str) -> Option<usize> {
        let state = self.state();
        (2..=state.pages.len()).find(|&page| {
            let style = state.controls.get(page - 2).copied();
            let n = page as u32;
            match style {
                Some(PageControl::Direct) => selector == self.selectors.page_button(n),
                Some(PageControl::Expansion) => selector == self.selectors.more_pages_button(n),
                None => false,
            }
        })
    }
}

fn label(target: &Target<FakeElement>) -> String {
    match target {
        Target::Selector(css) => css.clone(),
        Target::Element(FakeElement::Card(i)) => format!("card-{}", i),
        Target::Element(FakeElement::Input(css)) | Target::Element(FakeElement::Control(css)) => {
            css.clone()
        }
        Target::Within(FakeElement::Card(i), css) => format!("card-{} {}", i, css),
        Target::Within(_, css) => css.clone(),
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.record(format!("navigate {}", url));
        if self.state().fail_navigation {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        Ok(())
    }

    async fn fill(&self, target: &Target<FakeElement>, text: &str) -> Result<(), DriverError> {
        self.record(format!("fill {} = {}", label(target), text));
        Ok(())
    }

    async fn click(&self, target: &Target<FakeElement>) -> Result<(), DriverError> {
        self.record(format!("click {}", label(target)));
        self.check_connected()?;
        let fail = |reason: &str| DriverError::Action {
            action: "click",
            target: label(target),
            reason: reason.to_string(),
        };
        match target {
            Target::Element(FakeElement::Card(i)) => {
                let state = self.state();
                let unclickable = state.pages[state.current]
                    .get(*i)
                    .map(|card| card.unclickable)
                    .unwrap_or(true);
                if unclickable {
                    return Err(fail("element click intercepted"));
                }
                Ok(())
            }
            Target::Element(FakeElement::Control(css)) => {
                if self.state().broken_page_controls {
                    return Err(fail("stale element reference"));
                }
                let page = self.control_target(css).ok_or_else(|| fail("no such element"))?;
                self.state().current = page - 1;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn read_text(
        &self,
        target: &Target<FakeElement>,
    ) -> Result<Option<String>, DriverError> {
        self.record(format!("read_text {}", label(target)));
        self.check_connected()?;
        let text = match target {
            Target::Within(FakeElement::Card(i), css) => {
                let card = {
                    let state = self.state();
                    state.pages[state.current].get(*i).cloned()
                };
                card.and_then(|card| self.card_field(&card, css))
            }
            _ => None,
        };
        Ok(text.map(|text| text.trim().to_string()))
    }

    async fn read_attribute(
        &self,
        target: &Target<FakeElement>,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.record(format!("read_attribute {} {}", label(target), name));
        self.check_connected()?;
        let value = match target {
            Target::Element(FakeElement::Card(i)) if name == self.selectors.job_id_attribute => {
                let state = self.state();
                state.pages[state.current].get(*i).and_then(|card| card.id.clone())
            }
            _ => None,
        };
        Ok(value)
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<FakeElement>, DriverError> {
        self.record(format!("find_all {}", selector));
        self.check_connected()?;
        let mut state = self.state();
        if selector == self.selectors.job_cards {
            if state.fail_listing_query_on_page == Some(state.current + 1) {
                return Err(DriverError::Session("chrome not reachable".to_string()));
            }
            if state.disconnect_after_listing_query_on_page == Some(state.current + 1) {
                state.disconnected = true;
            }
            return Ok((0..state.pages[state.current].len()).map(FakeElement::Card).collect());
        }
        if selector == self.selectors.location_input && !state.missing_location_input {
            return Ok(vec![FakeElement::Input(selector.to_string())]);
        }
        Ok(Vec::new())
    }

    async fn scroll_into_view(&self, target: &Target<FakeElement>) -> Result<(), DriverError> {
        self.record(format!("scroll {}", label(target)));
        self.check_connected()
    }

    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<FakeElement>, DriverError> {
        self.record(format!("wait_for {} {}ms", selector, timeout.as_millis()));
        self.check_connected()?;
        Ok(self
            .control_target(selector)
            .map(|_| FakeElement::Control(selector.to_string())))
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.record("close".to_string());
        self.state().closed = true;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    jobs: BTreeMap<String, ListingRecord>,
    employers: BTreeMap<String, EmployerRecord>,
    calls: Vec<String>,
    failing_lookups: HashSet<String>,
}

/// In-memory `RecordStore` that logs every call.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn with_jobs(ids: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.lock().unwrap();
            for id in ids {
                inner.jobs.insert(
                    id.to_string(),
                    ListingRecord::new(
                        id.to_string(),
                        "Existing".to_string(),
                        "Existing Co".to_string(),
                        String::new(),
                        "https://jobs.example.com/view/",
                    ),
                );
            }
        }
        store
    }

    /// Make `is_new_job(id)` fail with a database error.
    pub fn fail_lookup(&self, id: &str) {
        self.inner.lock().unwrap().failing_lookups.insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().jobs.keys().cloned().collect()
    }

    pub fn job(&self, id: &str) -> Option<ListingRecord> {
        self.inner.lock().unwrap().jobs.get(id).cloned()
    }

    pub fn employers(&self) -> Vec<EmployerRecord> {
        self.inner.lock().unwrap().employers.values().cloned().collect()
    }
}

impl RecordStore for MemoryStore {
    fn is_new_job(&self, external_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("is_new_job {}", external_id));
        if inner.failing_lookups.contains(external_id) {
            return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        Ok(!inner.jobs.contains_key(external_id))
    }

    fn is_new_employer(&self, company: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("is_new_employer {}", company));
        Ok(!inner.employers.contains_key(company))
    }

    fn add_job(&self, record: &ListingRecord) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("add_job {}", record.external_id));
        record.validate()?;
        if inner.jobs.contains_key(&record.external_id) {
            return Ok(false);
        }
        inner.jobs.insert(record.external_id.clone(), record.clone());
        Ok(true)
    }

    fn add_employer(&self, record: &EmployerRecord) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("add_employer {}", record.company));
        record.validate()?;
        if inner.employers.contains_key(&record.company) {
            return Ok(false);
        }
        inner.employers.insert(record.company.clone(), record.clone());
        Ok(true)
    }

    fn search_jobs(&self, term: &str) -> Result<Vec<ListingRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .values()
            .filter(|job| job.title.contains(term) || job.company.contains(term))
            .cloned()
            .collect())
    }
}
