//! In-memory entity store and the request fulfillment state machine.
//!
//! The [`Ledger`] knows nothing about transports or persistence technology.
//! It owns the donor, hospital and request registries plus the append-mostly
//! donation history, and it is the single place where the Open ⇄ Accepted
//! transitions of a request are decided. Callers that share a ledger across
//! tasks are expected to serialise mutations behind a lock so that each
//! accept/reject evaluates its preconditions and applies its mutation against
//! one consistent snapshot (see [`crate::service`]).

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{
    blood::BloodGroup,
    donor::Donor,
    eligibility::{CooldownRule, Eligibility},
    geo::Coordinates,
    history::{DonationRecord, DonationStatistics},
    hospital::{Hospital, LicenseId},
    request::{Request, RequestStatus},
    ErrorKind,
};

/// The in-memory registry of donors, hospitals, requests and donations.
#[derive(Debug, Default)]
pub struct Ledger {
    /// Donors keyed by id.
    donors: HashMap<Uuid, Donor>,

    /// Hospitals keyed by id.
    hospitals: HashMap<Uuid, Hospital>,

    /// Requests keyed by id.
    requests: HashMap<Uuid, Request>,

    /// Donation history, in insertion order. Append-mostly; eligibility only
    /// ever reads it.
    history: Vec<DonationRecord>,
}

impl Ledger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a donor.
    ///
    /// # Panics
    ///
    /// Panics if a donor with the same id is already registered.
    pub fn register_donor(&mut self, donor: Donor) {
        let id = donor.id();
        assert!(
            !self.donors.contains_key(&id),
            "Duplicate donor id: {id}"
        );
        self.donors.insert(id, donor);
    }

    /// Registers a hospital, enforcing license uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateLicense`] if another hospital
    /// already holds the same license id.
    ///
    /// # Panics
    ///
    /// Panics if a hospital with the same id is already registered.
    pub fn register_hospital(&mut self, hospital: Hospital) -> Result<(), RegistrationError> {
        let id = hospital.id();
        assert!(
            !self.hospitals.contains_key(&id),
            "Duplicate hospital id: {id}"
        );
        if let Some(existing) = self
            .hospitals
            .values()
            .find(|h| h.license_id() == hospital.license_id())
        {
            return Err(RegistrationError::DuplicateLicense {
                license_id: hospital.license_id().clone(),
                holder: existing.id(),
            });
        }
        self.hospitals.insert(id, hospital);
        Ok(())
    }

    /// Looks up a donor by id.
    #[must_use]
    pub fn donor(&self, id: Uuid) -> Option<&Donor> {
        self.donors.get(&id)
    }

    /// Looks up a hospital by id.
    #[must_use]
    pub fn hospital(&self, id: Uuid) -> Option<&Hospital> {
        self.hospitals.get(&id)
    }

    /// Looks up a request by id.
    #[must_use]
    pub fn request(&self, id: Uuid) -> Option<&Request> {
        self.requests.get(&id)
    }

    /// Replaces a donor's location and stamps the update time.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownDonor`] if the donor is not registered.
    pub fn update_donor_location(
        &mut self,
        donor_id: Uuid,
        coordinates: Coordinates,
        now: DateTime<Utc>,
    ) -> Result<&Donor, UnknownDonor> {
        let donor = self
            .donors
            .get_mut(&donor_id)
            .ok_or(UnknownDonor(donor_id))?;
        donor.update_location(coordinates, now);
        Ok(&*donor)
    }

    /// Appends a record to the donation history.
    pub fn record_donation(&mut self, record: DonationRecord) {
        self.history.push(record);
    }

    /// A donor's donation history, most recent donation first, with
    /// aggregate statistics.
    #[must_use]
    pub fn donation_history(&self, donor_id: Uuid) -> (Vec<DonationRecord>, DonationStatistics) {
        let mut records: Vec<DonationRecord> = self
            .history
            .iter()
            .filter(|record| record.donor_id == donor_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.donation_date.cmp(&a.donation_date));
        let statistics = DonationStatistics::summarise(&records);
        (records, statistics)
    }

    /// The most recent *verified* donation for a donor, if any.
    #[must_use]
    pub fn latest_verified_donation(&self, donor_id: Uuid) -> Option<&DonationRecord> {
        self.history
            .iter()
            .filter(|record| record.donor_id == donor_id && record.verified)
            .max_by_key(|record| record.donation_date)
    }

    /// Evaluates a donor's eligibility against their verified history.
    #[must_use]
    pub fn eligibility(&self, donor_id: Uuid, rule: CooldownRule, now: DateTime<Utc>) -> Eligibility {
        Eligibility::evaluate(rule, self.latest_verified_donation(donor_id), now)
    }

    /// Hospitals within `radius_km` of `origin`. Empty when none are in
    /// range.
    #[must_use]
    pub fn hospitals_within(&self, origin: &Coordinates, radius_km: f64) -> Vec<&Hospital> {
        self.hospitals
            .values()
            .filter(|hospital| origin.is_within_km(hospital.location(), radius_km))
            .collect()
    }

    /// Donors within `radius_km` of `origin`.
    ///
    /// This is the fanout-scale query: it scans the whole donor registry, so
    /// the filter runs in parallel.
    #[must_use]
    pub fn donors_within(&self, origin: &Coordinates, radius_km: f64) -> Vec<&Donor> {
        self.donors
            .par_iter()
            .map(|(_, donor)| donor)
            .filter(|donor| origin.is_within_km(donor.coordinates(), radius_km))
            .collect()
    }

    /// All donors with exactly the given blood group, regardless of
    /// location.
    #[must_use]
    pub fn donors_with_blood_group(&self, blood_group: BloodGroup) -> Vec<&Donor> {
        self.donors
            .values()
            .filter(|donor| donor.blood_group() == blood_group)
            .collect()
    }

    /// Open requests a donor could satisfy: posted by a hospital within
    /// `radius_km` of the donor, with a blood group the donor's group may
    /// donate to. Most recent first.
    #[must_use]
    pub fn nearby_compatible_requests(&self, donor: &Donor, radius_km: f64) -> Vec<Request> {
        let nearby: HashSet<Uuid> = self
            .hospitals_within(donor.coordinates(), radius_km)
            .into_iter()
            .map(Hospital::id)
            .collect();

        let mut matches: Vec<Request> = self
            .requests
            .values()
            .filter(|request| request.status() == RequestStatus::Open)
            .filter(|request| nearby.contains(&request.hospital_id()))
            .filter(|request| donor.blood_group().can_donate_to(request.blood_group()))
            .cloned()
            .collect();
        sort_newest_first(&mut matches);
        matches
    }

    /// The request, if any, to which a donor is actively committed.
    ///
    /// A commitment is active while the request is Open or Accepted.
    #[must_use]
    pub fn active_commitment(&self, donor_id: Uuid) -> Option<&Request> {
        self.requests
            .values()
            .find(|request| request.status().is_active() && request.has_accepted(donor_id))
    }

    /// Creates and stores an open request for a hospital.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownHospital`] if the hospital is not registered.
    pub fn create_request(
        &mut self,
        hospital_id: Uuid,
        blood_group: BloodGroup,
        units: NonZeroU32,
    ) -> Result<Request, UnknownHospital> {
        if !self.hospitals.contains_key(&hospital_id) {
            return Err(UnknownHospital(hospital_id));
        }
        let request = Request::new(hospital_id, blood_group, units);
        self.requests.insert(request.id(), request.clone());
        tracing::info!(
            request = %request.id(),
            %blood_group,
            units = units.get(),
            "created blood request"
        );
        Ok(request)
    }

    /// A donor accepts an open request.
    ///
    /// Preconditions, checked in order against the current snapshot: the
    /// donor is registered; the donor is eligible to donate; the donor holds
    /// no active commitment to another request; the request exists and is
    /// Open; the donor has not already accepted it. On success the donor is
    /// appended to the acceptance list and the request transitions to
    /// Accepted once the list covers the required units.
    ///
    /// # Errors
    ///
    /// Returns the [`ActionError`] variant for the first violated
    /// precondition; the ledger is unchanged on error.
    #[instrument(skip(self, rule, now))]
    pub fn accept(
        &mut self,
        request_id: Uuid,
        donor_id: Uuid,
        rule: CooldownRule,
        now: DateTime<Utc>,
    ) -> Result<ActionOutcome, ActionError> {
        if !self.donors.contains_key(&donor_id) {
            return Err(ActionError::DonorNotFound(donor_id));
        }

        let eligibility = self.eligibility(donor_id, rule, now);
        if !eligibility.eligible {
            return Err(ActionError::Ineligible {
                last_donation: eligibility.last_donation,
                next_eligible: eligibility.next_eligible,
            });
        }

        if let Some(current) = self.active_commitment(donor_id) {
            if current.id() != request_id {
                return Err(ActionError::AlreadyCommitted {
                    current: current.id(),
                });
            }
        }

        let request = self
            .requests
            .get_mut(&request_id)
            .ok_or(ActionError::RequestNotFound(request_id))?;

        if request.status() != RequestStatus::Open {
            return Err(ActionError::NotOpen(request.status()));
        }
        if request.has_accepted(donor_id) {
            return Err(ActionError::AlreadyAccepted);
        }

        request.record_acceptance(donor_id);
        tracing::info!(
            request = %request_id,
            donor = %donor_id,
            accepted = request.accepted_count(),
            status = %request.status(),
            "donor accepted request"
        );
        Ok(ActionOutcome::of(request))
    }

    /// A donor withdraws a previous acceptance.
    ///
    /// Preconditions: the request exists and the donor is in its acceptance
    /// list. On success the donor is removed and the request reverts to Open
    /// if the remaining list no longer covers the required units.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::RequestNotFound`] or
    /// [`ActionError::NotAccepted`]; the ledger is unchanged on error.
    #[instrument(skip(self))]
    pub fn reject(&mut self, request_id: Uuid, donor_id: Uuid) -> Result<ActionOutcome, ActionError> {
        let request = self
            .requests
            .get_mut(&request_id)
            .ok_or(ActionError::RequestNotFound(request_id))?;

        if !request.withdraw_acceptance(donor_id) {
            return Err(ActionError::NotAccepted);
        }
        tracing::info!(
            request = %request_id,
            donor = %donor_id,
            accepted = request.accepted_count(),
            status = %request.status(),
            "donor withdrew from request"
        );
        Ok(ActionOutcome::of(request))
    }

    /// All requests owned by a hospital, most recent first.
    #[must_use]
    pub fn requests_of(&self, hospital_id: Uuid) -> Vec<Request> {
        let mut requests: Vec<Request> = self
            .requests
            .values()
            .filter(|request| request.hospital_id() == hospital_id)
            .cloned()
            .collect();
        sort_newest_first(&mut requests);
        requests
    }

    /// A hospital's requests with the given status, most recent first.
    #[must_use]
    pub fn requests_of_by_status(&self, hospital_id: Uuid, status: RequestStatus) -> Vec<Request> {
        let mut requests: Vec<Request> = self
            .requests
            .values()
            .filter(|request| request.hospital_id() == hospital_id && request.status() == status)
            .cloned()
            .collect();
        sort_newest_first(&mut requests);
        requests
    }

    /// Per-status counts of a hospital's requests.
    #[must_use]
    pub fn requests_summary(&self, hospital_id: Uuid) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for request in self
            .requests
            .values()
            .filter(|request| request.hospital_id() == hospital_id)
        {
            match request.status() {
                RequestStatus::Open => summary.open += 1,
                RequestStatus::Accepted => summary.accepted += 1,
                RequestStatus::Fulfilled => summary.fulfilled += 1,
                RequestStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    /// Applies a hospital's edit to one of its own requests.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::NotFoundOrNotOwned`] if the request does not
    /// exist or belongs to another hospital.
    #[instrument(skip(self, update))]
    pub fn update_request(
        &mut self,
        hospital_id: Uuid,
        request_id: Uuid,
        update: RequestUpdate,
    ) -> Result<Request, EditError> {
        let request = self
            .requests
            .get_mut(&request_id)
            .filter(|request| request.hospital_id() == hospital_id)
            .ok_or(EditError::NotFoundOrNotOwned(request_id))?;

        if let Some(status) = update.status {
            request.set_status(status);
        }
        if let Some(units) = update.units {
            request.set_units(units);
        }
        if let Some(blood_group) = update.blood_group {
            request.set_blood_group(blood_group);
        }
        Ok(request.clone())
    }

    /// Deletes one of a hospital's own requests, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::NotFoundOrNotOwned`] if the request does not
    /// exist or belongs to another hospital.
    pub fn delete_request(
        &mut self,
        hospital_id: Uuid,
        request_id: Uuid,
    ) -> Result<Request, EditError> {
        if self
            .requests
            .get(&request_id)
            .is_none_or(|request| request.hospital_id() != hospital_id)
        {
            return Err(EditError::NotFoundOrNotOwned(request_id));
        }
        Ok(self
            .requests
            .remove(&request_id)
            .expect("request presence checked above"))
    }

    /// Deletes all of a hospital's requests, returning how many were
    /// removed.
    pub fn delete_all_requests(&mut self, hospital_id: Uuid) -> usize {
        let before = self.requests.len();
        self.requests
            .retain(|_, request| request.hospital_id() != hospital_id);
        before - self.requests.len()
    }

    /// Unique donors who have donated at a hospital, with their donation
    /// activity, most active first.
    #[must_use]
    pub fn donor_roster(&self, hospital_id: Uuid) -> Vec<DonorActivity> {
        let mut by_donor: HashMap<Uuid, DonorActivity> = HashMap::new();
        for record in self
            .history
            .iter()
            .filter(|record| record.hospital_id == hospital_id)
        {
            let Some(donor) = self.donors.get(&record.donor_id) else {
                continue;
            };
            let entry = by_donor
                .entry(record.donor_id)
                .or_insert_with(|| DonorActivity {
                    donor_id: donor.id(),
                    name: donor.name().to_string(),
                    email: donor.email().to_string(),
                    phone: donor.phone().to_string(),
                    blood_group: donor.blood_group(),
                    donation_count: 0,
                    last_donation: record.donation_date,
                    total_units: 0,
                });
            entry.donation_count += 1;
            entry.total_units += record.units;
            entry.last_donation = entry.last_donation.max(record.donation_date);
        }

        let mut roster: Vec<DonorActivity> = by_donor.into_values().collect();
        roster.sort_by(|a, b| {
            b.donation_count
                .cmp(&a.donation_count)
                .then_with(|| b.last_donation.cmp(&a.last_donation))
        });
        roster
    }
}

fn sort_newest_first(requests: &mut [Request]) {
    requests.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
}

/// The result of a successful accept or reject action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    /// The request after the action.
    pub request: Request,
    /// The request's status after the action.
    pub status: RequestStatus,
    /// Number of donors in the acceptance list after the action.
    pub accepted_count: usize,
    /// Units the request requires.
    pub required_units: u32,
}

impl ActionOutcome {
    fn of(request: &Request) -> Self {
        Self {
            status: request.status(),
            accepted_count: request.accepted_count(),
            required_units: request.units().get(),
            request: request.clone(),
        }
    }
}

/// Per-status counts of a hospital's requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    /// Requests still accepting donors.
    pub open: usize,
    /// Requests with enough accepted donors.
    pub accepted: usize,
    /// Requests whose units have been collected.
    pub fulfilled: usize,
    /// Requests withdrawn by the hospital.
    pub cancelled: usize,
}

/// A hospital's edit to one of its requests. Unset fields are left
/// unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestUpdate {
    /// New lifecycle status, if changing.
    pub status: Option<RequestStatus>,
    /// New unit count, if changing.
    pub units: Option<NonZeroU32>,
    /// New blood group, if changing.
    pub blood_group: Option<BloodGroup>,
}

/// One donor's aggregate donation activity at a hospital.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorActivity {
    /// The donor's id.
    pub donor_id: Uuid,
    /// The donor's name.
    pub name: String,
    /// The donor's email address.
    pub email: String,
    /// The donor's phone number.
    pub phone: String,
    /// The donor's blood group.
    pub blood_group: BloodGroup,
    /// Number of donations at this hospital.
    pub donation_count: usize,
    /// Date of the most recent donation at this hospital.
    pub last_donation: DateTime<Utc>,
    /// Units donated at this hospital.
    pub total_units: u32,
}

/// Errors from donor accept/reject actions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The request does not exist.
    #[error("request {0} not found")]
    RequestNotFound(Uuid),
    /// The donor does not exist.
    #[error("donor {0} not found")]
    DonorNotFound(Uuid),
    /// The request is not accepting donors.
    #[error("request is no longer open (status: {0})")]
    NotOpen(RequestStatus),
    /// The donor is already in the acceptance list.
    #[error("donor has already accepted this request")]
    AlreadyAccepted,
    /// The donor is not in the acceptance list.
    #[error("donor has not accepted this request")]
    NotAccepted,
    /// The donor is already committed to another active request.
    #[error("donor is already committed to request {current}; withdraw from it first")]
    AlreadyCommitted {
        /// The request the donor is currently committed to.
        current: Uuid,
    },
    /// The donor's post-donation cooldown has not elapsed.
    #[error("donor is not eligible to donate until {next_eligible:?}")]
    Ineligible {
        /// Date of the donor's most recent verified donation.
        last_donation: Option<DateTime<Utc>>,
        /// First date the donor may donate again.
        next_eligible: Option<DateTime<Utc>>,
    },
}

impl ActionError {
    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestNotFound(_) | Self::DonorNotFound(_) => ErrorKind::NotFound,
            Self::NotOpen(_)
            | Self::AlreadyAccepted
            | Self::NotAccepted
            | Self::AlreadyCommitted { .. }
            | Self::Ineligible { .. } => ErrorKind::Conflict,
        }
    }
}

/// Errors from hospital registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// Another hospital already holds this license id.
    #[error("license id {license_id} is already registered to hospital {holder}")]
    DuplicateLicense {
        /// The contested license id.
        license_id: LicenseId,
        /// The hospital currently holding it.
        holder: Uuid,
    },
}

/// Errors from hospital-scoped request edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    /// The request does not exist, or belongs to another hospital. The two
    /// cases are deliberately indistinguishable so a hospital cannot probe
    /// for other hospitals' request ids.
    #[error("request {0} not found or not owned by this hospital")]
    NotFoundOrNotOwned(Uuid),
}

impl EditError {
    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFoundOrNotOwned(_) => ErrorKind::NotFound,
        }
    }
}

impl RegistrationError {
    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateLicense { .. } => ErrorKind::Conflict,
        }
    }
}

/// Error returned when a donor id is not registered.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("donor {0} not found")]
pub struct UnknownDonor(pub(crate) Uuid);

impl UnknownDonor {
    /// The id that failed to resolve.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.0
    }

    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::NotFound
    }
}

/// Error returned when a hospital id is not registered.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("hospital {0} not found")]
pub struct UnknownHospital(pub(crate) Uuid);

impl UnknownHospital {
    /// The id that failed to resolve.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.0
    }

    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{ActionError, Ledger, RequestUpdate};
    use crate::domain::{
        blood::BloodGroup,
        donor::{Donor, RegisteredBy},
        eligibility::CooldownRule,
        geo::{Coordinates, EARTH_RADIUS_KM},
        history::DonationRecord,
        hospital::{Hospital, LicenseId},
        request::RequestStatus,
    };

    const RULE: CooldownRule = CooldownRule::CalendarMonths(3);

    fn coords(longitude: f64, latitude: f64) -> Coordinates {
        Coordinates::new(longitude, latitude).unwrap()
    }

    /// A point roughly `km` kilometres north of `origin`.
    fn km_north_of(origin: &Coordinates, km: f64) -> Coordinates {
        let dlat = (km / EARTH_RADIUS_KM).to_degrees();
        coords(origin.longitude(), origin.latitude() + dlat)
    }

    fn hospital_at(location: Coordinates, license: &str) -> Hospital {
        Hospital::new(
            "City General",
            LicenseId::new(license).unwrap(),
            "12 Main Road",
            "080-555-0101",
            location,
        )
    }

    fn donor_at(location: Coordinates, blood_group: BloodGroup) -> Donor {
        Donor::new(
            "Test Donor",
            "9000000000",
            "donor@example.com",
            blood_group,
            RegisteredBy::Donor,
            location,
        )
    }

    /// A ledger seeded with one hospital and one open request for `units`
    /// units of B+.
    fn seeded(units: u32) -> (Ledger, Uuid, Uuid) {
        let mut ledger = Ledger::new();
        let hospital = hospital_at(coords(77.59, 12.91), "KA-BLR-00421");
        let hospital_id = hospital.id();
        ledger.register_hospital(hospital).unwrap();
        let request = ledger
            .create_request(
                hospital_id,
                BloodGroup::BPos,
                NonZeroU32::new(units).unwrap(),
            )
            .unwrap();
        (ledger, hospital_id, request.id())
    }

    fn add_donor(ledger: &mut Ledger, blood_group: BloodGroup) -> Uuid {
        let donor = donor_at(coords(77.60, 12.92), blood_group);
        let id = donor.id();
        ledger.register_donor(donor);
        id
    }

    #[test]
    fn accept_fills_request_and_transitions_status() {
        let (mut ledger, _, request_id) = seeded(2);
        let first = add_donor(&mut ledger, BloodGroup::BPos);
        let second = add_donor(&mut ledger, BloodGroup::ONeg);

        let outcome = ledger.accept(request_id, first, RULE, Utc::now()).unwrap();
        assert_eq!(outcome.status, RequestStatus::Open);
        assert_eq!(outcome.accepted_count, 1);
        assert_eq!(outcome.required_units, 2);

        let outcome = ledger.accept(request_id, second, RULE, Utc::now()).unwrap();
        assert_eq!(outcome.status, RequestStatus::Accepted);
        assert_eq!(outcome.request.accepted_donor_ids(), &[first, second]);
    }

    #[test]
    fn accept_on_a_filled_request_is_a_conflict() {
        let (mut ledger, _, request_id) = seeded(1);
        let first = add_donor(&mut ledger, BloodGroup::BPos);
        let latecomer = add_donor(&mut ledger, BloodGroup::AbNeg);

        ledger.accept(request_id, first, RULE, Utc::now()).unwrap();

        let err = ledger
            .accept(request_id, latecomer, RULE, Utc::now())
            .expect_err("request is already filled");
        assert_eq!(err, ActionError::NotOpen(RequestStatus::Accepted));
    }

    #[test]
    fn reject_after_accept_restores_the_previous_state() {
        let (mut ledger, _, request_id) = seeded(1);
        let donor = add_donor(&mut ledger, BloodGroup::BPos);

        let before: Vec<Uuid> = ledger.request(request_id).unwrap().accepted_donor_ids().to_vec();
        let before_status = ledger.request(request_id).unwrap().status();

        ledger.accept(request_id, donor, RULE, Utc::now()).unwrap();
        let outcome = ledger.reject(request_id, donor).unwrap();

        assert_eq!(outcome.request.accepted_donor_ids(), before.as_slice());
        assert_eq!(outcome.status, before_status);
    }

    #[test]
    fn reject_without_prior_accept_is_a_conflict() {
        let (mut ledger, _, request_id) = seeded(1);
        let donor = add_donor(&mut ledger, BloodGroup::BPos);

        let err = ledger
            .reject(request_id, donor)
            .expect_err("donor never accepted");
        assert_eq!(err, ActionError::NotAccepted);
    }

    #[test]
    fn accept_on_missing_request_is_not_found() {
        let (mut ledger, _, _) = seeded(1);
        let donor = add_donor(&mut ledger, BloodGroup::BPos);
        let missing = Uuid::new_v4();

        let err = ledger
            .accept(missing, donor, RULE, Utc::now())
            .expect_err("request does not exist");
        assert_eq!(err, ActionError::RequestNotFound(missing));
    }

    #[test]
    fn unknown_donor_cannot_accept() {
        let (mut ledger, _, request_id) = seeded(1);
        let stranger = Uuid::new_v4();

        let err = ledger
            .accept(request_id, stranger, RULE, Utc::now())
            .expect_err("donor is not registered");
        assert_eq!(err, ActionError::DonorNotFound(stranger));
    }

    #[test]
    fn donor_cannot_commit_to_two_active_requests() {
        let (mut ledger, hospital_id, first_request) = seeded(2);
        let second_request = ledger
            .create_request(hospital_id, BloodGroup::BPos, NonZeroU32::new(1).unwrap())
            .unwrap()
            .id();
        let donor = add_donor(&mut ledger, BloodGroup::BPos);

        ledger.accept(first_request, donor, RULE, Utc::now()).unwrap();

        let err = ledger
            .accept(second_request, donor, RULE, Utc::now())
            .expect_err("donor is already committed");
        assert_eq!(
            err,
            ActionError::AlreadyCommitted {
                current: first_request
            }
        );

        // Withdrawing the first commitment frees the donor up again.
        ledger.reject(first_request, donor).unwrap();
        ledger.accept(second_request, donor, RULE, Utc::now()).unwrap();

        let active: Vec<_> = [first_request, second_request]
            .into_iter()
            .filter(|id| ledger.request(*id).unwrap().has_accepted(donor))
            .collect();
        assert_eq!(active, vec![second_request]);
    }

    #[test]
    fn donor_in_cooldown_cannot_accept() {
        let (mut ledger, hospital_id, request_id) = seeded(1);
        let donor = add_donor(&mut ledger, BloodGroup::BPos);

        let last_month = Utc::now() - Duration::days(30);
        ledger.record_donation(DonationRecord::verified(donor, hospital_id, last_month));

        let err = ledger
            .accept(request_id, donor, RULE, Utc::now())
            .expect_err("cooldown has not elapsed");
        match err {
            ActionError::Ineligible {
                last_donation,
                next_eligible,
            } => {
                assert_eq!(last_donation, Some(last_month));
                assert!(next_eligible.unwrap() > Utc::now());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unverified_donations_do_not_block_acceptance() {
        let (mut ledger, hospital_id, request_id) = seeded(1);
        let donor = add_donor(&mut ledger, BloodGroup::BPos);

        ledger.record_donation(DonationRecord::new(donor, hospital_id));

        ledger
            .accept(request_id, donor, RULE, Utc::now())
            .expect("unverified history must not count toward the cooldown");
    }

    #[test]
    fn nearby_compatible_requests_filters_by_radius_and_compatibility() {
        let mut ledger = Ledger::new();
        let donor_location = coords(77.59, 12.91);

        let near = hospital_at(km_north_of(&donor_location, 2.0), "KA-BLR-00001");
        let far = hospital_at(km_north_of(&donor_location, 9.0), "KA-BLR-00002");
        let (near_id, far_id) = (near.id(), far.id());
        ledger.register_hospital(near).unwrap();
        ledger.register_hospital(far).unwrap();

        let units = NonZeroU32::new(1).unwrap();
        // Compatible and nearby: visible.
        let visible = ledger
            .create_request(near_id, BloodGroup::AbPos, units)
            .unwrap();
        // Nearby but incompatible with a B+ donor: hidden.
        ledger
            .create_request(near_id, BloodGroup::ANeg, units)
            .unwrap();
        // Compatible but out of range: hidden.
        ledger
            .create_request(far_id, BloodGroup::BPos, units)
            .unwrap();

        let donor = donor_at(donor_location, BloodGroup::BPos);
        let found = ledger.nearby_compatible_requests(&donor, 5.0);

        assert_eq!(
            found.iter().map(super::Request::id).collect::<Vec<_>>(),
            vec![visible.id()]
        );
    }

    #[test]
    fn nearby_requests_exclude_non_open_statuses() {
        let (mut ledger, _, request_id) = seeded(1);
        let donor = add_donor(&mut ledger, BloodGroup::BPos);

        ledger.accept(request_id, donor, RULE, Utc::now()).unwrap();

        let browsing = donor_at(coords(77.59, 12.91), BloodGroup::ONeg);
        assert!(ledger.nearby_compatible_requests(&browsing, 5.0).is_empty());
    }

    #[test]
    fn duplicate_license_is_rejected() {
        let mut ledger = Ledger::new();
        ledger
            .register_hospital(hospital_at(coords(77.59, 12.91), "KA-BLR-00421"))
            .unwrap();

        let err = ledger
            .register_hospital(hospital_at(coords(77.61, 12.93), "KA-BLR-00421"))
            .expect_err("license ids must be unique");
        assert!(matches!(
            err,
            super::RegistrationError::DuplicateLicense { .. }
        ));
    }

    #[test]
    fn only_the_owner_may_edit_or_delete_a_request() {
        let (mut ledger, _, request_id) = seeded(1);
        let other = hospital_at(coords(77.61, 12.93), "KA-BLR-00999");
        let other_id = other.id();
        ledger.register_hospital(other).unwrap();

        let update = RequestUpdate {
            status: Some(RequestStatus::Cancelled),
            ..RequestUpdate::default()
        };
        assert!(ledger.update_request(other_id, request_id, update).is_err());
        assert!(ledger.delete_request(other_id, request_id).is_err());
        assert_eq!(
            ledger.request(request_id).unwrap().status(),
            RequestStatus::Open
        );
    }

    #[test]
    fn owner_edits_apply_and_summary_reflects_them() {
        let (mut ledger, hospital_id, request_id) = seeded(1);
        ledger
            .create_request(hospital_id, BloodGroup::OPos, NonZeroU32::new(2).unwrap())
            .unwrap();

        let update = RequestUpdate {
            status: Some(RequestStatus::Fulfilled),
            units: NonZeroU32::new(3),
            blood_group: Some(BloodGroup::ANeg),
        };
        let updated = ledger.update_request(hospital_id, request_id, update).unwrap();
        assert_eq!(updated.status(), RequestStatus::Fulfilled);
        assert_eq!(updated.units().get(), 3);
        assert_eq!(updated.blood_group(), BloodGroup::ANeg);

        let summary = ledger.requests_summary(hospital_id);
        assert_eq!(summary.open, 1);
        assert_eq!(summary.fulfilled, 1);
        assert_eq!(summary.accepted + summary.cancelled, 0);
    }

    #[test]
    fn delete_all_requests_reports_the_count() {
        let (mut ledger, hospital_id, _) = seeded(1);
        ledger
            .create_request(hospital_id, BloodGroup::OPos, NonZeroU32::new(1).unwrap())
            .unwrap();

        assert_eq!(ledger.delete_all_requests(hospital_id), 2);
        assert_eq!(ledger.delete_all_requests(hospital_id), 0);
        assert!(ledger.requests_of(hospital_id).is_empty());
    }

    #[test]
    fn donation_history_is_newest_first_with_statistics() {
        let (mut ledger, hospital_id, _) = seeded(1);
        let donor = add_donor(&mut ledger, BloodGroup::BPos);

        let old = Utc::now() - Duration::days(400);
        let recent = Utc::now() - Duration::days(10);
        ledger.record_donation(DonationRecord::verified(donor, hospital_id, old).with_units(2));
        ledger.record_donation(DonationRecord::verified(donor, hospital_id, recent));
        ledger.record_donation(DonationRecord::new(donor, hospital_id));

        let (records, stats) = ledger.donation_history(donor);
        assert_eq!(records.len(), 3);
        assert!(records.windows(2).all(|w| w[0].donation_date >= w[1].donation_date));
        assert_eq!(stats.verified_donations, 2);
        assert_eq!(stats.pending_verification, 1);
        assert_eq!(stats.total_units, 4);
    }

    #[test]
    fn donor_roster_aggregates_and_sorts_by_activity() {
        let (mut ledger, hospital_id, _) = seeded(1);
        let frequent = add_donor(&mut ledger, BloodGroup::BPos);
        let occasional = add_donor(&mut ledger, BloodGroup::ONeg);

        for days_ago in [300, 200, 100] {
            ledger.record_donation(DonationRecord::verified(
                frequent,
                hospital_id,
                Utc::now() - Duration::days(days_ago),
            ));
        }
        ledger.record_donation(DonationRecord::verified(
            occasional,
            hospital_id,
            Utc::now() - Duration::days(50),
        ));

        let roster = ledger.donor_roster(hospital_id);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].donor_id, frequent);
        assert_eq!(roster[0].donation_count, 3);
        assert_eq!(roster[1].donor_id, occasional);
    }

    #[test]
    fn update_donor_location_stamps_time() {
        let mut ledger = Ledger::new();
        let donor = donor_at(coords(77.59, 12.91), BloodGroup::APos);
        let donor_id = donor.id();
        ledger.register_donor(donor);

        let now = Utc::now();
        let moved = coords(77.61, 12.93);
        let updated = ledger.update_donor_location(donor_id, moved, now).unwrap();
        assert_eq!(updated.coordinates(), &moved);
        assert_eq!(updated.location().last_updated, now);

        assert!(
            ledger
                .update_donor_location(Uuid::new_v4(), moved, now)
                .is_err()
        );
    }
}
