use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{blood::BloodGroup, geo::Coordinates};

/// A registered blood donor.
///
/// Identity, contact and registration provenance are set at registration and
/// immutable from this crate's perspective; the location is the one field the
/// matching engine mutates, via [`Donor::update_location`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    id: Uuid,
    name: String,
    phone: String,
    email: String,
    blood_group: BloodGroup,
    #[serde(flatten)]
    registered_by: RegisteredBy,
    location: TrackedLocation,
}

/// Who registered the donor.
///
/// A hospital-registered donor always carries the registering hospital's id;
/// the pairing is a single sum type so a "hospital-registered donor with no
/// hospital" cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "registeredBy", content = "hospitalId")]
pub enum RegisteredBy {
    /// The donor registered themselves.
    Donor,
    /// A hospital registered the donor on their behalf.
    Hospital(Uuid),
}

/// A donor's last known position and when it was reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedLocation {
    /// The reported coordinates.
    pub coordinates: Coordinates,
    /// When the coordinates were last updated.
    pub last_updated: DateTime<Utc>,
}

impl Donor {
    /// Creates a donor with a fresh id, located at `coordinates` as of now.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
        blood_group: BloodGroup,
        registered_by: RegisteredBy,
        coordinates: Coordinates,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
            blood_group,
            registered_by,
            location: TrackedLocation {
                coordinates,
                last_updated: Utc::now(),
            },
        }
    }

    /// The donor's stable identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The donor's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The donor's phone number.
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// The donor's email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// The donor's blood group.
    #[must_use]
    pub const fn blood_group(&self) -> BloodGroup {
        self.blood_group
    }

    /// Who registered the donor.
    #[must_use]
    pub const fn registered_by(&self) -> RegisteredBy {
        self.registered_by
    }

    /// The donor's last known location.
    #[must_use]
    pub const fn location(&self) -> &TrackedLocation {
        &self.location
    }

    /// The donor's last known coordinates.
    #[must_use]
    pub const fn coordinates(&self) -> &Coordinates {
        &self.location.coordinates
    }

    /// Replaces the donor's location and stamps the update time.
    pub fn update_location(&mut self, coordinates: Coordinates, now: DateTime<Utc>) {
        self.location = TrackedLocation {
            coordinates,
            last_updated: now,
        };
    }
}
