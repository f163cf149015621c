//! Donor eligibility evaluation.
//!
//! A donor may not donate again until a cooldown has elapsed since their
//! most recent *verified* donation. Unverified records never count. The
//! evaluation is a pure computation over the latest verified record: calling
//! it twice with no intervening donation yields identical results.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::history::DonationRecord;

/// How the post-donation cooldown is measured.
///
/// Calendar-month and fixed-day arithmetic disagree near month-length
/// boundaries (Jan 31 plus 3 months is Apr 30, but plus 90 days is May 1).
/// Both interpretations are supported; exactly one rule is configured and
/// every call site uses it, so the two cannot be mixed within a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownRule {
    /// Calendar-month addition, e.g. Jan 31 + 3 months = Apr 30.
    CalendarMonths(u32),
    /// A fixed number of days regardless of month lengths.
    FixedDays(u32),
}

impl Default for CooldownRule {
    fn default() -> Self {
        Self::CalendarMonths(3)
    }
}

impl CooldownRule {
    /// The first instant at which a donor who donated at `last` may donate
    /// again.
    ///
    /// Saturates at the maximum representable timestamp if the addition
    /// overflows the calendar range.
    #[must_use]
    pub fn next_eligible(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::CalendarMonths(months) => last
                .checked_add_months(Months::new(*months))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::FixedDays(days) => last
                .checked_add_signed(Duration::days(i64::from(*days)))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// The outcome of an eligibility evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    /// Whether the donor may currently donate.
    pub eligible: bool,
    /// Date of the most recent verified donation, if any.
    pub last_donation: Option<DateTime<Utc>>,
    /// First date the donor may donate again, if a cooldown applies.
    pub next_eligible: Option<DateTime<Utc>>,
    /// Human-readable explanation of the outcome.
    pub reason: String,
}

impl Eligibility {
    /// Evaluates eligibility against the latest verified donation record.
    ///
    /// `last_verified` must be the most recent record with `verified = true`
    /// for the donor, or `None` if there is none. A donor with no verified
    /// history is eligible.
    #[must_use]
    pub fn evaluate(
        rule: CooldownRule,
        last_verified: Option<&DonationRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(record) = last_verified else {
            return Self {
                eligible: true,
                last_donation: None,
                next_eligible: None,
                reason: "no verified donation on record".to_string(),
            };
        };

        let last = record.donation_date;
        let next = rule.next_eligible(last);

        if now < next {
            Self {
                eligible: false,
                last_donation: Some(last),
                next_eligible: Some(next),
                reason: format!(
                    "last donation was on {}; next eligible on {}",
                    last.format("%Y-%m-%d"),
                    next.format("%Y-%m-%d")
                ),
            }
        } else {
            Self {
                eligible: true,
                last_donation: Some(last),
                next_eligible: Some(next),
                reason: "cooldown since last donation has elapsed".to_string(),
            }
        }
    }
}
