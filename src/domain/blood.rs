use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// One of the eight canonical ABO/Rh blood groups.
///
/// The set is closed: parsing is the only fallible operation, and every
/// compatibility lookup on parsed values is total. This deliberately rules
/// out the failure mode where an unrecognised label silently falls back to
/// "incompatible" deep inside a matching query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    /// A positive.
    #[serde(rename = "A+")]
    APos,
    /// A negative.
    #[serde(rename = "A-")]
    ANeg,
    /// B positive.
    #[serde(rename = "B+")]
    BPos,
    /// B negative.
    #[serde(rename = "B-")]
    BNeg,
    /// AB positive.
    #[serde(rename = "AB+")]
    AbPos,
    /// AB negative.
    #[serde(rename = "AB-")]
    AbNeg,
    /// O positive.
    #[serde(rename = "O+")]
    OPos,
    /// O negative.
    #[serde(rename = "O-")]
    ONeg,
}

/// Donor → recipient transfusion compatibility.
///
/// Rows are donor groups, columns are recipient groups, both in the order of
/// [`BloodGroup::ALL`]. The table is written out in full rather than derived
/// from ABO/Rh rules so that a reviewer can check it row by row against the
/// medical convention.
const COMPATIBLE: [[bool; 8]; 8] = [
    // recipient:  A+     A-     B+     B-     AB+    AB-    O+     O-
    /* A+  */ [true, false, false, false, true, false, false, false],
    /* A-  */ [true, true, false, false, true, true, false, false],
    /* B+  */ [false, false, true, false, true, false, false, false],
    /* B-  */ [false, false, true, true, true, true, false, false],
    /* AB+ */ [false, false, false, false, true, false, false, false],
    /* AB- */ [false, false, false, false, true, true, false, false],
    /* O+  */ [true, false, true, false, true, false, true, false],
    /* O-  */ [true, true, true, true, true, true, true, true],
];

impl BloodGroup {
    /// All eight groups, in table order.
    pub const ALL: [Self; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Whether a donor of this group may satisfy a request for `recipient`.
    #[must_use]
    pub const fn can_donate_to(self, recipient: Self) -> bool {
        COMPATIBLE[self.index()][recipient.index()]
    }

    /// Whether a request for this group may be satisfied by `donor`.
    #[must_use]
    pub const fn can_receive_from(self, donor: Self) -> bool {
        donor.can_donate_to(self)
    }

    /// The donor groups that may satisfy a request for this group.
    pub fn compatible_donors(self) -> impl Iterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(move |donor| donor.can_donate_to(self))
    }

    /// The canonical label, e.g. `"AB+"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = ParseBloodGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A+" => Ok(Self::APos),
            "A-" => Ok(Self::ANeg),
            "B+" => Ok(Self::BPos),
            "B-" => Ok(Self::BNeg),
            "AB+" => Ok(Self::AbPos),
            "AB-" => Ok(Self::AbNeg),
            "O+" => Ok(Self::OPos),
            "O-" => Ok(Self::ONeg),
            other => Err(ParseBloodGroupError(other.to_string())),
        }
    }
}

/// Error returned when a string is not one of the eight ABO/Rh labels.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown blood group '{0}': expected one of A+, A-, B+, B-, AB+, AB-, O+, O-")]
pub struct ParseBloodGroupError(String);

impl ParseBloodGroupError {
    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> crate::domain::ErrorKind {
        crate::domain::ErrorKind::Validation
    }
}
