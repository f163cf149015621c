//! Best-effort notification fanout to candidate donors.
//!
//! Delivery itself (email, SMS) is an external collaborator behind the
//! [`Notify`] trait. Fanout never fails the operation that triggered it:
//! individual delivery failures are logged and counted, not retried and not
//! propagated.

use serde::Serialize;
use thiserror::Error;

use crate::{
    domain::{blood::BloodGroup, donor::Donor, hospital::Hospital, request::Request},
    ledger::Ledger,
};

/// An external delivery channel for donor notifications.
///
/// Implementations deliver a single notification to a single donor and report
/// failure through [`NotifyError`]; the dispatcher decides what failure means
/// (nothing, beyond a log line and a count).
pub trait Notify {
    /// Delivers one notification to one donor.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the delivery attempt failed. The dispatcher
    /// swallows the error; implementations should not retry internally.
    fn notify(&self, donor: &Donor, notification: &Notification<'_>) -> Result<(), NotifyError>;
}

/// What a donor is being notified about.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    /// A newly created request from a nearby hospital.
    RequestFanout {
        /// The request needing donors.
        request: &'a Request,
        /// The hospital that posted it.
        hospital: &'a Hospital,
    },
    /// A hospital-initiated appeal for a blood type, independent of any
    /// request.
    BloodTypeAppeal {
        /// The blood group being appealed for.
        blood_group: BloodGroup,
        /// The appealing hospital.
        hospital: &'a Hospital,
    },
}

/// Error returned by a [`Notify`] implementation when delivery fails.
#[derive(Debug, Error)]
#[error("notification delivery failed: {reason}")]
pub struct NotifyError {
    /// Why delivery failed.
    pub reason: String,
}

/// Outcome of a fanout run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutReport {
    /// Donors that matched the candidate filter.
    pub total_candidates: usize,
    /// Notifications that were delivered successfully.
    pub delivered: usize,
}

/// Notifies donors near the hospital whose blood group exactly matches a new
/// request.
///
/// The candidate filter is deliberately *exact* blood-group match, not the
/// compatibility matrix used when a donor browses nearby requests: fanout
/// targets the focused audience, browsing shows every donor who could help.
pub fn notify_nearby_donors(
    ledger: &Ledger,
    notifier: &dyn Notify,
    request: &Request,
    hospital: &Hospital,
    radius_km: f64,
) -> FanoutReport {
    let candidates: Vec<&Donor> = ledger
        .donors_within(hospital.location(), radius_km)
        .into_iter()
        .filter(|donor| donor.blood_group() == request.blood_group())
        .collect();

    let notification = Notification::RequestFanout { request, hospital };
    let report = deliver_all(notifier, &candidates, &notification);
    tracing::info!(
        request = %request.id(),
        hospital = %hospital.id(),
        candidates = report.total_candidates,
        delivered = report.delivered,
        "request fanout complete"
    );
    report
}

/// Notifies every donor with exactly the given blood group, regardless of
/// location.
pub fn notify_by_blood_type(
    ledger: &Ledger,
    notifier: &dyn Notify,
    hospital: &Hospital,
    blood_group: BloodGroup,
) -> FanoutReport {
    let candidates = ledger.donors_with_blood_group(blood_group);
    let notification = Notification::BloodTypeAppeal {
        blood_group,
        hospital,
    };
    let report = deliver_all(notifier, &candidates, &notification);
    tracing::info!(
        hospital = %hospital.id(),
        %blood_group,
        candidates = report.total_candidates,
        delivered = report.delivered,
        "blood type appeal complete"
    );
    report
}

fn deliver_all(
    notifier: &dyn Notify,
    candidates: &[&Donor],
    notification: &Notification<'_>,
) -> FanoutReport {
    let mut delivered = 0;
    for donor in candidates {
        match notifier.notify(donor, notification) {
            Ok(()) => delivered += 1,
            Err(error) => {
                tracing::warn!(donor = %donor.id(), %error, "notification delivery failed");
            }
        }
    }
    FanoutReport {
        total_candidates: candidates.len(),
        delivered,
    }
}
