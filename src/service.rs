//! Async operation facade over a shared [`Ledger`].
//!
//! The ledger is wrapped in an `Arc<RwLock<_>>` and shared across tasks.
//! Accept/reject run entirely under one write guard, so each call's
//! precondition checks and mutation are atomic: two donors racing for the
//! last slot of a request are serialised, and at most `units` donors are
//! ever accepted. Browsing and reporting operations take read guards.
//!
//! Transport and framing are out of scope; callers adapt these operations to
//! whatever protocol they serve.

use std::{num::NonZeroU32, str::FromStr, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    dispatch::{self, FanoutReport, Notify},
    domain::{
        blood::BloodGroup,
        donor::Donor,
        eligibility::Eligibility,
        geo::Coordinates,
        history::{DonationRecord, DonationStatistics},
        request::{Request, RequestStatus},
        Config, ErrorKind,
    },
    ledger::{
        ActionError, ActionOutcome, DonorActivity, EditError, Ledger, RequestUpdate,
        StatusSummary, UnknownDonor, UnknownHospital,
    },
};

/// The matching engine's operation surface.
///
/// Cheap to clone; clones share the same ledger and notifier.
#[derive(Clone)]
pub struct MatchingService {
    /// The shared entity store.
    ledger: Arc<RwLock<Ledger>>,
    /// External delivery collaborator for donor notifications.
    notifier: Arc<dyn Notify + Send + Sync>,
    /// Engine configuration, fixed at construction.
    config: Config,
}

impl MatchingService {
    /// Creates a service owning a fresh lock around the given ledger.
    #[must_use]
    pub fn new(
        ledger: Ledger,
        notifier: Arc<dyn Notify + Send + Sync>,
        config: Config,
    ) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            notifier,
            config,
        }
    }

    /// A handle to the shared ledger, for seeding and inspection.
    #[must_use]
    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        Arc::clone(&self.ledger)
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Open requests near a donor that their blood group can satisfy.
    ///
    /// Runs the eligibility evaluation first: an ineligible donor receives
    /// the eligibility detail and an empty request list. Requests are sorted
    /// most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownDonor`] if the donor is not registered.
    pub async fn nearby_requests(&self, donor_id: Uuid) -> Result<NearbyRequests, UnknownDonor> {
        let ledger = self.ledger.read().await;
        let donor = ledger.donor(donor_id).ok_or(UnknownDonor(donor_id))?;

        let eligibility = ledger.eligibility(donor_id, self.config.cooldown, Utc::now());
        let requests = if eligibility.eligible {
            ledger.nearby_compatible_requests(donor, self.config.discovery_radius_km)
        } else {
            Vec::new()
        };

        Ok(NearbyRequests {
            eligible: eligibility.eligible,
            donor_blood_group: donor.blood_group(),
            eligibility,
            requests,
        })
    }

    /// Applies a donor's accept or reject action to a request.
    ///
    /// The whole call runs under one write guard: checks and mutation are
    /// atomic with respect to every other action on the same ledger.
    ///
    /// # Errors
    ///
    /// Returns the [`ActionError`] for the first violated precondition.
    pub async fn handle_action(
        &self,
        request_id: Uuid,
        donor_id: Uuid,
        action: Action,
    ) -> Result<ActionOutcome, ActionError> {
        let mut ledger = self.ledger.write().await;
        match action {
            Action::Accept => ledger.accept(request_id, donor_id, self.config.cooldown, Utc::now()),
            Action::Reject => ledger.reject(request_id, donor_id),
        }
    }

    /// Creates a blood request for a hospital and fans it out to nearby
    /// donors.
    ///
    /// `units` defaults to 1. Fanout is best-effort: it runs after the
    /// request is stored, outside the write guard, and cannot fail this
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownHospital`] if the hospital is not registered.
    pub async fn create_request(
        &self,
        hospital_id: Uuid,
        blood_group: BloodGroup,
        units: Option<NonZeroU32>,
    ) -> Result<Request, UnknownHospital> {
        let units = units.unwrap_or(NonZeroU32::MIN);
        let request = {
            let mut ledger = self.ledger.write().await;
            ledger.create_request(hospital_id, blood_group, units)?
        };

        let ledger = self.ledger.read().await;
        if let Some(hospital) = ledger.hospital(hospital_id) {
            dispatch::notify_nearby_donors(
                &ledger,
                self.notifier.as_ref(),
                &request,
                hospital,
                self.config.fanout_radius_km,
            );
        }
        Ok(request)
    }

    /// Hospital-initiated appeal to every donor with exactly the given blood
    /// group, independent of any request.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownHospital`] if the hospital is not registered.
    pub async fn notify_by_blood_type(
        &self,
        hospital_id: Uuid,
        blood_group: BloodGroup,
    ) -> Result<FanoutReport, UnknownHospital> {
        let ledger = self.ledger.read().await;
        let hospital = ledger
            .hospital(hospital_id)
            .ok_or(UnknownHospital(hospital_id))?;
        Ok(dispatch::notify_by_blood_type(
            &ledger,
            self.notifier.as_ref(),
            hospital,
            blood_group,
        ))
    }

    /// All requests owned by a hospital, most recent first.
    pub async fn hospital_requests(&self, hospital_id: Uuid) -> Vec<Request> {
        self.ledger.read().await.requests_of(hospital_id)
    }

    /// A hospital's requests with the given status, most recent first.
    pub async fn hospital_requests_by_status(
        &self,
        hospital_id: Uuid,
        status: RequestStatus,
    ) -> Vec<Request> {
        self.ledger
            .read()
            .await
            .requests_of_by_status(hospital_id, status)
    }

    /// Per-status counts of a hospital's requests.
    pub async fn requests_summary(&self, hospital_id: Uuid) -> StatusSummary {
        self.ledger.read().await.requests_summary(hospital_id)
    }

    /// Applies a hospital's edit to one of its own requests.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::NotFoundOrNotOwned`] if the request does not
    /// exist or belongs to another hospital.
    pub async fn update_request(
        &self,
        hospital_id: Uuid,
        request_id: Uuid,
        update: RequestUpdate,
    ) -> Result<Request, EditError> {
        self.ledger
            .write()
            .await
            .update_request(hospital_id, request_id, update)
    }

    /// Deletes one of a hospital's own requests, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::NotFoundOrNotOwned`] if the request does not
    /// exist or belongs to another hospital.
    pub async fn delete_request(
        &self,
        hospital_id: Uuid,
        request_id: Uuid,
    ) -> Result<Request, EditError> {
        self.ledger
            .write()
            .await
            .delete_request(hospital_id, request_id)
    }

    /// Deletes all of a hospital's requests, returning how many were
    /// removed.
    pub async fn delete_all_requests(&self, hospital_id: Uuid) -> usize {
        self.ledger.write().await.delete_all_requests(hospital_id)
    }

    /// Unique donors who have donated at a hospital, most active first.
    pub async fn donor_roster(&self, hospital_id: Uuid) -> Vec<DonorActivity> {
        self.ledger.read().await.donor_roster(hospital_id)
    }

    /// A donor's donation history, most recent first, with statistics.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownDonor`] if the donor is not registered.
    pub async fn donation_history(&self, donor_id: Uuid) -> Result<DonationHistory, UnknownDonor> {
        let ledger = self.ledger.read().await;
        let donor = ledger.donor(donor_id).ok_or(UnknownDonor(donor_id))?;
        let (records, statistics) = ledger.donation_history(donor_id);
        Ok(DonationHistory {
            donor_name: donor.name().to_string(),
            donor_blood_group: donor.blood_group(),
            statistics,
            records,
        })
    }

    /// Replaces a donor's location, re-validating the coordinates and
    /// stamping the update time.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownDonor`] if the donor is not registered.
    pub async fn update_donor_location(
        &self,
        donor_id: Uuid,
        coordinates: Coordinates,
    ) -> Result<Donor, UnknownDonor> {
        let mut ledger = self.ledger.write().await;
        ledger
            .update_donor_location(donor_id, coordinates, Utc::now())
            .map(Clone::clone)
    }
}

/// A donor's decision on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Commit to donating for the request.
    Accept,
    /// Withdraw a previous acceptance.
    Reject,
}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(ParseActionError(other.to_string())),
        }
    }
}

/// Error returned when an action string is neither `"accept"` nor
/// `"reject"`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid action '{0}': must be either \"accept\" or \"reject\"")]
pub struct ParseActionError(String);

impl ParseActionError {
    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Response to a donor's nearby-request query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyRequests {
    /// Whether the donor may currently donate.
    pub eligible: bool,
    /// The browsing donor's blood group.
    pub donor_blood_group: BloodGroup,
    /// The full eligibility evaluation.
    pub eligibility: Eligibility,
    /// Open, in-range, compatible requests, most recent first. Empty when
    /// the donor is ineligible.
    pub requests: Vec<Request>,
}

/// Response to a donor's donation-history query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationHistory {
    /// The donor's name.
    pub donor_name: String,
    /// The donor's blood group.
    pub donor_blood_group: BloodGroup,
    /// Aggregate statistics over the records.
    pub statistics: DonationStatistics,
    /// The donation records, most recent first.
    pub records: Vec<DonationRecord>,
}
