use std::{fmt, num::NonZeroU32, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::blood::BloodGroup;

/// A hospital's standing ask for blood.
///
/// The request owns an ordered, duplicate-free list of donors who have
/// accepted it. Acceptance order is insertion order. Status transitions are
/// driven by the ledger's accept/reject operations; this type only maintains
/// the structural coupling between the list length and the Open/Accepted
/// pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    id: Uuid,
    hospital_id: Uuid,
    blood_group: BloodGroup,
    units: NonZeroU32,
    status: RequestStatus,
    created_at: DateTime<Utc>,
    accepted_donor_ids: Vec<Uuid>,
}

impl Request {
    /// Creates an open request with a fresh id, dated now.
    #[must_use]
    pub fn new(hospital_id: Uuid, blood_group: BloodGroup, units: NonZeroU32) -> Self {
        Self {
            id: Uuid::new_v4(),
            hospital_id,
            blood_group,
            units,
            status: RequestStatus::Open,
            created_at: Utc::now(),
            accepted_donor_ids: Vec::new(),
        }
    }

    /// The request's stable identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The hospital that owns the request.
    #[must_use]
    pub const fn hospital_id(&self) -> Uuid {
        self.hospital_id
    }

    /// The blood group being requested.
    #[must_use]
    pub const fn blood_group(&self) -> BloodGroup {
        self.blood_group
    }

    /// The number of units required.
    #[must_use]
    pub const fn units(&self) -> NonZeroU32 {
        self.units
    }

    /// The request's lifecycle status.
    #[must_use]
    pub const fn status(&self) -> RequestStatus {
        self.status
    }

    /// When the request was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Donors who have accepted, in acceptance order.
    #[must_use]
    pub fn accepted_donor_ids(&self) -> &[Uuid] {
        &self.accepted_donor_ids
    }

    /// Number of donors who have accepted.
    #[must_use]
    pub const fn accepted_count(&self) -> usize {
        self.accepted_donor_ids.len()
    }

    /// Whether the donor is in the accepted list.
    #[must_use]
    pub fn has_accepted(&self, donor_id: Uuid) -> bool {
        self.accepted_donor_ids.contains(&donor_id)
    }

    fn units_needed(&self) -> usize {
        usize::try_from(self.units.get()).expect("u32 fits in usize")
    }

    /// Appends a donor to the accepted list; transitions Open → Accepted once
    /// the list covers the required units.
    ///
    /// The caller is responsible for the business preconditions (request is
    /// Open, donor not already present).
    pub(crate) fn record_acceptance(&mut self, donor_id: Uuid) {
        debug_assert!(!self.has_accepted(donor_id));
        self.accepted_donor_ids.push(donor_id);
        if self.accepted_donor_ids.len() >= self.units_needed() {
            self.status = RequestStatus::Accepted;
        }
    }

    /// Removes a donor from the accepted list; reverts Accepted → Open if the
    /// list no longer covers the required units.
    ///
    /// Returns `false` if the donor was not in the list.
    pub(crate) fn withdraw_acceptance(&mut self, donor_id: Uuid) -> bool {
        let Some(position) = self
            .accepted_donor_ids
            .iter()
            .position(|id| *id == donor_id)
        else {
            return false;
        };
        self.accepted_donor_ids.remove(position);
        if self.accepted_donor_ids.len() < self.units_needed()
            && self.status == RequestStatus::Accepted
        {
            self.status = RequestStatus::Open;
        }
        true
    }

    pub(crate) const fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
    }

    pub(crate) const fn set_units(&mut self, units: NonZeroU32) {
        self.units = units;
    }

    pub(crate) const fn set_blood_group(&mut self, blood_group: BloodGroup) {
        self.blood_group = blood_group;
    }
}

/// Lifecycle status of a [`Request`].
///
/// Donor accept/reject actions move a request between `Open` and `Accepted`;
/// `Fulfilled` and `Cancelled` are reached through hospital-side edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Accepting donors.
    Open,
    /// Enough donors have accepted to cover the required units.
    Accepted,
    /// The requested units have been collected and verified.
    Fulfilled,
    /// Withdrawn by the owning hospital.
    Cancelled,
}

impl RequestStatus {
    /// Whether a donor committed to a request in this status counts as
    /// actively committed.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::Accepted)
    }

    /// The canonical label, e.g. `"Open"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Accepted => "Accepted",
            Self::Fulfilled => "Fulfilled",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "Accepted" => Ok(Self::Accepted),
            "Fulfilled" => Ok(Self::Fulfilled),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Error returned when a string is not a recognised request status.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown request status '{0}': expected Open, Accepted, Fulfilled or Cancelled")]
pub struct ParseStatusError(String);

impl ParseStatusError {
    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> crate::domain::ErrorKind {
        crate::domain::ErrorKind::Validation
    }
}
