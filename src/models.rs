use serde::{Deserialize, Serialize};

use crate::error::{Field, StoreError};

/// Marker that separates a location from its remote-status suffix,
/// e.g. `"Austin, TX (Remote)"`.
const REMOTE_MARKER: &str = " (";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location_raw: String,
    pub location: String,
    pub remote_status: String, // "" when the listing had no suffix
    pub source_url: String,
}

impl ListingRecord {
    pub fn new(
        external_id: String,
        title: String,
        company: String,
        location_raw: String,
        listing_base_url: &str,
    ) -> Self {
        let (location, remote_status) = parse_location(&location_raw);
        let source_url = format!("{}{}", listing_base_url, external_id);
        Self {
            external_id,
            title,
            company,
            location_raw,
            location,
            remote_status,
            source_url,
        }
    }

    /// Required fields for persistence: id, company, title.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.external_id.trim().is_empty() {
            return Err(StoreError::Rejected(Field::ExternalId));
        }
        if self.company.trim().is_empty() {
            return Err(StoreError::Rejected(Field::Company));
        }
        if self.title.trim().is_empty() {
            return Err(StoreError::Rejected(Field::Title));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerRecord {
    pub company: String,
    pub region: String,
}

impl EmployerRecord {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.company.trim().is_empty() {
            return Err(StoreError::Rejected(Field::Company));
        }
        if self.region.trim().is_empty() {
            return Err(StoreError::Rejected(Field::Region));
        }
        Ok(())
    }
}

/// Split a rendered location into `(location, remote_status)`.
///
/// `"Austin, TX (Remote)"` becomes `("Austin, TX", "Remote")`. Text without
/// the `" ("` marker is returned unchanged with an empty status.
pub fn parse_location(raw: &str) -> (String, String) {
    match raw.split_once(REMOTE_MARKER) {
        Some((location, rest)) => {
            let status = match rest.find(')') {
                Some(end) => &rest[..end],
                None => rest,
            };
            (location.to_string(), status.to_string())
        }
        None => (raw.to_string(), String::new()),
    }
}
