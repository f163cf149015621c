use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::blood::BloodGroup;

/// One entry in the append-mostly donation ledger.
///
/// Records are created when a donation is logged and later flipped to
/// `verified` by the hospital; only verified records count toward
/// eligibility. This module never mutates records, it only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRecord {
    /// The donor who gave blood.
    pub donor_id: Uuid,
    /// The hospital where the donation took place.
    pub hospital_id: Uuid,
    /// The request this donation satisfied, if it answered one.
    pub request_id: Option<Uuid>,
    /// Blood group recorded at donation time, if captured.
    pub blood_group: Option<BloodGroup>,
    /// When the donation took place.
    pub donation_date: DateTime<Utc>,
    /// Units donated.
    pub units: u32,
    /// Whether the hospital has verified the donation.
    pub verified: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl DonationRecord {
    /// Creates an unverified single-unit record dated now.
    #[must_use]
    pub fn new(donor_id: Uuid, hospital_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            donor_id,
            hospital_id,
            request_id: None,
            blood_group: None,
            donation_date: now,
            units: 1,
            verified: false,
            created_at: now,
        }
    }

    /// Creates a verified single-unit record with the given donation date.
    #[must_use]
    pub fn verified(donor_id: Uuid, hospital_id: Uuid, donation_date: DateTime<Utc>) -> Self {
        Self {
            donor_id,
            hospital_id,
            request_id: None,
            blood_group: None,
            donation_date,
            units: 1,
            verified: true,
            created_at: donation_date,
        }
    }

    /// Associates the record with the request it satisfied.
    #[must_use]
    pub const fn for_request(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Sets the units donated.
    #[must_use]
    pub const fn with_units(mut self, units: u32) -> Self {
        self.units = units;
        self
    }
}

/// Aggregate statistics over a donor's donation history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationStatistics {
    /// Total number of recorded donations.
    pub total_donations: usize,
    /// Donations the hospital has verified.
    pub verified_donations: usize,
    /// Donations still awaiting verification.
    pub pending_verification: usize,
    /// Units donated across all records.
    pub total_units: u32,
}

impl DonationStatistics {
    /// Computes statistics over a donor's records.
    #[must_use]
    pub fn summarise<'a>(records: impl IntoIterator<Item = &'a DonationRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total_donations += 1;
            if record.verified {
                stats.verified_donations += 1;
            } else {
                stats.pending_verification += 1;
            }
            stats.total_units += record.units;
        }
        stats
    }
}
