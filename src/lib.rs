//! Blood donor matching and request fulfillment.
//!
//! Hospitals post requests for blood; nearby eligible donors discover and
//! accept them. This crate owns the matching core: blood-group
//! compatibility, donor eligibility, geospatial discovery, the request
//! accept/reject state machine and best-effort notification fanout.

pub mod domain;
pub use domain::{
    BloodGroup, Config, CooldownRule, Coordinates, Donor, DonationRecord, Eligibility, ErrorKind,
    Hospital, LicenseId, RegisteredBy, Request, RequestStatus,
};

pub mod ledger;
pub use ledger::{ActionError, ActionOutcome, Ledger, RequestUpdate};

pub mod dispatch;
pub use dispatch::{FanoutReport, Notification, Notify, NotifyError};

pub mod service;
pub use service::{Action, MatchingService, NearbyRequests};
