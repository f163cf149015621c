use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geo::Coordinates;

/// A hospital that posts blood requests and hosts donations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    id: Uuid,
    name: String,
    license_id: LicenseId,
    address: String,
    phone: String,
    email: Option<String>,
    location: Coordinates,
}

impl Hospital {
    /// Creates a hospital with a fresh id.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        license_id: LicenseId,
        address: impl Into<String>,
        phone: impl Into<String>,
        location: Coordinates,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            license_id,
            address: address.into(),
            phone: phone.into(),
            email: None,
            location,
        }
    }

    /// Sets the contact email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// The hospital's stable identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The hospital's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The hospital's unique license identifier.
    #[must_use]
    pub const fn license_id(&self) -> &LicenseId {
        &self.license_id
    }

    /// The hospital's street address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The hospital's phone number.
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// The hospital's contact email, if registered.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// The hospital's coordinates.
    #[must_use]
    pub const fn location(&self) -> &Coordinates {
        &self.location
    }
}

/// A validated hospital license/registration number.
///
/// Uppercase alphanumeric with optional dash separators, 5 to 32 characters,
/// e.g. `KA-BLR-00421`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseId(String);

static LICENSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9][A-Z0-9-]{3,30}[A-Z0-9]$").expect("license pattern is valid")
});

impl LicenseId {
    /// Validates and wraps a license identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLicenseId`] if the string does not match the required
    /// format.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidLicenseId> {
        let raw = raw.into();
        if LICENSE_PATTERN.is_match(&raw) {
            Ok(Self(raw))
        } else {
            Err(InvalidLicenseId(raw))
        }
    }

    /// The license identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LicenseId {
    type Err = InvalidLicenseId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LicenseId {
    type Error = InvalidLicenseId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LicenseId> for String {
    fn from(license: LicenseId) -> Self {
        license.0
    }
}

/// Error returned when a license identifier does not match the required
/// format.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "invalid license id '{0}': expected 5-32 uppercase alphanumeric characters with optional dashes"
)]
pub struct InvalidLicenseId(String);

impl InvalidLicenseId {
    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> crate::domain::ErrorKind {
        crate::domain::ErrorKind::Validation
    }
}
