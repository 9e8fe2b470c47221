//! Moving from one results page to the next.
//!
//! Small result sets render every page number as a link. Large ones render a
//! few numbers and hide the rest behind an expansion control keyed by the
//! same page number. The numbered control is always tried first; the
//! expansion control is only looked for after that wait runs out.

use tracing::{debug, info, warn};

use crate::config::{PaginationTimeouts, Selectors};
use crate::driver::{BrowserDriver, Target};
use crate::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    AtPage(u32),
    Advancing(u32),
    Exhausted,
}

/// Which control moved us forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    PageNumber,
    Expansion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next { page: u32, via: Control },
    /// No control for the next page exists. Normal end of a search.
    Exhausted,
}

pub struct PaginationController<'a> {
    selectors: &'a Selectors,
    timeouts: PaginationTimeouts,
    state: PaginationState,
}

impl<'a> PaginationController<'a> {
    pub fn new(selectors: &'a Selectors, timeouts: PaginationTimeouts) -> Self {
        Self {
            selectors,
            timeouts,
            state: PaginationState::AtPage(1),
        }
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn current_page(&self) -> Option<u32> {
        match self.state {
            PaginationState::AtPage(n) => Some(n),
            _ => None,
        }
    }

    /// Try to reach the next page. Once exhausted, stays exhausted.
    ///
    /// `Err` means the browser could not be queried at all; the controller is
    /// left exhausted and the caller should end the session.
    pub async fn advance<D: BrowserDriver>(&mut self, driver: &D) -> Result<Advance, DriverError> {
        let current = match self.state {
            PaginationState::AtPage(n) => n,
            PaginationState::Advancing(_) | PaginationState::Exhausted => {
                self.state = PaginationState::Exhausted;
                return Ok(Advance::Exhausted);
            }
        };
        let next = current + 1;
        self.state = PaginationState::Advancing(next);

        // Controls render lazily; bring the list into view first.
        let list = Target::css(self.selectors.pagination_list.clone());
        if let Err(e) = driver.scroll_into_view(&list).await {
            warn!(error = %e, "could not scroll pagination list into view");
        }

        debug!(page = next, "looking for pagination control");
        let found = match self.find_control(driver, next).await {
            Ok(found) => found,
            Err(e) => {
                self.state = PaginationState::Exhausted;
                return Err(e);
            }
        };
        let Some((control, via)) = found else {
            info!(page = current, "no further pages");
            self.state = PaginationState::Exhausted;
            return Ok(Advance::Exhausted);
        };

        match driver.click(&Target::Element(control)).await {
            Ok(()) => {
                info!(page = next, ?via, "advanced to next page");
                self.state = PaginationState::AtPage(next);
                Ok(Advance::Next { page: next, via })
            }
            Err(e) => {
                // A control that exists but cannot be clicked ends the search
                // rather than aborting it.
                warn!(page = next, error = %e, "pagination click failed, treating as last page");
                self.state = PaginationState::Exhausted;
                Ok(Advance::Exhausted)
            }
        }
    }

    async fn find_control<D: BrowserDriver>(
        &self,
        driver: &D,
        page: u32,
    ) -> Result<Option<(D::Element, Control)>, DriverError> {
        let numbered = self.selectors.page_button(page);
        if let Some(el) = driver.wait_for(&numbered, self.timeouts.page_control).await? {
            return Ok(Some((el, Control::PageNumber)));
        }

        info!(page, "page control not rendered, looking for more pages control");
        let expansion = self.selectors.more_pages_button(page);
        Ok(driver
            .wait_for(&expansion, self.timeouts.expansion_control)
            .await?
            .map(|el| (el, Control::Expansion)))
    }
}
