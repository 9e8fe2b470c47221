use tracing::debug;

use crate::config::Selectors;
use crate::driver::{BrowserDriver, Target};
use crate::error::{ExtractionError, Field};
use crate::models::ListingRecord;

/// Reads one job card into a `ListingRecord`.
///
/// The card is expected to be selected already (clicked) so its lazy content
/// is rendered; extraction itself only reads. The identifier is read once,
/// before the click, with `listing_id`.
pub struct ListingExtractor<'a> {
    selectors: &'a Selectors,
    listing_base_url: &'a str,
}

impl<'a> ListingExtractor<'a> {
    pub fn new(selectors: &'a Selectors, listing_base_url: &'a str) -> Self {
        Self {
            selectors,
            listing_base_url,
        }
    }

    /// The card's stable identifier attribute.
    pub async fn listing_id<D: BrowserDriver>(
        &self,
        driver: &D,
        card: &D::Element,
    ) -> Result<String, ExtractionError> {
        driver
            .read_attribute(&Target::Element(card.clone()), &self.selectors.job_id_attribute)
            .await?
            .map(|id| id.trim().to_string())
            .ok_or(ExtractionError::FieldMissing(Field::ExternalId))
    }

    pub async fn extract<D: BrowserDriver>(
        &self,
        driver: &D,
        card: &D::Element,
        external_id: String,
    ) -> Result<ListingRecord, ExtractionError> {
        let company = self
            .text(driver, card, &self.selectors.company, Field::Company)
            .await?;
        debug!(%company, "got company name");
        let title = self
            .text(driver, card, &self.selectors.job_title, Field::Title)
            .await?;
        debug!(%title, "got job title");
        let location_raw = self
            .text(driver, card, &self.selectors.job_location, Field::Location)
            .await?;

        let record = ListingRecord::new(
            external_id,
            title,
            company,
            location_raw,
            self.listing_base_url,
        );
        debug!(
            location = %record.location,
            remote_status = %record.remote_status,
            url = %record.source_url,
            "parsed listing"
        );
        Ok(record)
    }

    async fn text<D: BrowserDriver>(
        &self,
        driver: &D,
        card: &D::Element,
        selector: &str,
        field: Field,
    ) -> Result<String, ExtractionError> {
        driver
            .read_text(&Target::within(card, selector))
            .await?
            .ok_or(ExtractionError::FieldMissing(field))
    }
}
