//! # Coupon Codes
//!
//! Inventory rules for single-use incentive codes handed out on survey
//! completion.
//!
//! ## Lifecycle
//!
//! ```text
//! available ──(copied | emailed)──▶ used
//!     │
//!     └────────(expires_at passes)──▶ expired
//! ```
//!
//! A code is bound to at most one response. The binding itself is atomic in
//! the store (row lock with `SKIP LOCKED` on Postgres, a single write lock
//! in memory); this module only decides which codes are eligible.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CouponError, ValidationError};
use crate::identity::{CouponId, DeliveryId, ResponseId};

/// Validity window applied to imported codes.
pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// Stored status of a coupon code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Available,
    Used,
    Expired,
}

impl CouponStatus {
    /// Database/wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CouponStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "used" => Ok(Self::Used),
            "expired" => Ok(Self::Expired),
            _ => Err(ValidationError::UnknownCouponStatus(s.to_string())),
        }
    }
}

/// How a respondent took their code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum MarkAction {
    Copied,
    Emailed,
}

impl MarkAction {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copied => "copied",
            Self::Emailed => "emailed",
        }
    }
}

impl std::str::FromStr for MarkAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "copied" => Ok(Self::Copied),
            "emailed" => Ok(Self::Emailed),
            other => Err(ValidationError::UnknownMarkAction(other.to_string())),
        }
    }
}

/// A coupon code in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CouponCode {
    pub id: CouponId,
    pub code: String,
    pub status: CouponStatus,
    pub response_id: Option<ResponseId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub copied_at: Option<DateTime<Utc>>,
    pub emailed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CouponCode {
    /// Status derived from timestamps at `now`.
    ///
    /// Expiry wins over use; the stored `status` may lag behind this.
    pub fn effective_status(&self, now: DateTime<Utc>) -> CouponStatus {
        if self.expires_at < now {
            CouponStatus::Expired
        } else if self.copied_at.is_some() || self.emailed_at.is_some() {
            CouponStatus::Used
        } else {
            CouponStatus::Available
        }
    }

    /// Whether this code may be handed to a new response at `now`.
    pub fn is_allocatable(&self, now: DateTime<Utc>) -> bool {
        self.status == CouponStatus::Available
            && self.expires_at > now
            && self.copied_at.is_none()
            && self.emailed_at.is_none()
            && self.response_id.is_none()
    }

    /// Bind this code to `response`.
    pub fn assign(&mut self, response: ResponseId, now: DateTime<Utc>) {
        self.response_id = Some(response);
        self.assigned_at = Some(now);
    }

    /// Record that the code was copied or emailed.
    ///
    /// Both actions may be recorded on the same code; each sets its own
    /// timestamp once.
    pub fn mark(&mut self, action: MarkAction, now: DateTime<Utc>) -> Result<(), CouponError> {
        if self.expires_at < now {
            return Err(CouponError::Expired(self.code.clone()));
        }
        let slot = match action {
            MarkAction::Copied => &mut self.copied_at,
            MarkAction::Emailed => &mut self.emailed_at,
        };
        if slot.is_none() {
            *slot = Some(now);
        }
        self.status = CouponStatus::Used;
        Ok(())
    }
}

/// Normalize a raw code: trimmed and uppercased.
pub fn normalize_code(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(ValidationError::EmptyCouponCode);
    }
    Ok(code.to_uppercase())
}

/// Expiry for a code imported at `now`.
pub fn default_expiry(now: DateTime<Utc>, validity_days: i64) -> DateTime<Utc> {
    now + Duration::days(validity_days)
}

/// Index of the code to allocate: the oldest allocatable one.
///
/// Ordered by `created_at`, then `id`, matching the Postgres query.
pub fn select_allocatable(pool: &[CouponCode], now: DateTime<Utc>) -> Option<usize> {
    pool.iter()
        .enumerate()
        .filter(|(_, c)| c.is_allocatable(now))
        .min_by_key(|(_, c)| (c.created_at, c.id))
        .map(|(i, _)| i)
}

/// Result of allocating a code for a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CouponOutcome {
    /// A code was bound to the response.
    Assigned { code: String },
    /// The pool had no eligible code.
    Unavailable,
}

/// One failed line of a bulk import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportError {
    pub code: String,
    pub error: String,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportReport {
    pub created: Vec<CouponCode>,
    pub errors: Vec<ImportError>,
}

impl ImportReport {
    /// Record an input line that could not be imported.
    pub fn reject(&mut self, code: impl Into<String>, error: impl Into<String>) {
        self.errors.push(ImportError {
            code: code.into(),
            error: error.into(),
        });
    }
}

/// A record that a code was shown or sent to a respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CouponDelivery {
    pub id: DeliveryId,
    pub response_id: ResponseId,
    pub coupon_code: String,
    pub email_sent: bool,
    pub email_address: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn code(id: i64, created_offset_secs: i64, now: DateTime<Utc>) -> CouponCode {
        CouponCode {
            id: CouponId::new(id),
            code: format!("CODE{id}"),
            status: CouponStatus::Available,
            response_id: None,
            assigned_at: None,
            copied_at: None,
            emailed_at: None,
            expires_at: default_expiry(now, DEFAULT_VALIDITY_DAYS),
            notes: None,
            created_at: now + Duration::seconds(created_offset_secs),
        }
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_code("  abc-12 ").unwrap(), "ABC-12");
        assert_eq!(normalize_code(" \t"), Err(ValidationError::EmptyCouponCode));
    }

    #[test]
    fn effective_status_prefers_expiry() {
        let now = Utc::now();
        let mut c = code(1, 0, now);
        assert_eq!(c.effective_status(now), CouponStatus::Available);
        c.copied_at = Some(now);
        assert_eq!(c.effective_status(now), CouponStatus::Used);
        c.expires_at = now - Duration::days(1);
        assert_eq!(c.effective_status(now), CouponStatus::Expired);
    }

    #[test]
    fn mark_sets_timestamps_and_status() {
        let now = Utc::now();
        let mut c = code(1, 0, now);
        c.mark(MarkAction::Copied, now).unwrap();
        assert_eq!(c.status, CouponStatus::Used);
        assert_eq!(c.copied_at, Some(now));

        let later = now + Duration::minutes(5);
        c.mark(MarkAction::Emailed, later).unwrap();
        c.mark(MarkAction::Copied, later).unwrap();
        assert_eq!(c.emailed_at, Some(later));
        assert_eq!(c.copied_at, Some(now), "first copy timestamp is kept");
    }

    #[test]
    fn marking_an_expired_code_fails() {
        let now = Utc::now();
        let mut c = code(1, 0, now);
        c.expires_at = now - Duration::seconds(1);
        assert_eq!(
            c.mark(MarkAction::Emailed, now),
            Err(CouponError::Expired("CODE1".into()))
        );
        assert_eq!(c.status, CouponStatus::Available);
    }

    #[test]
    fn allocation_picks_oldest_eligible() {
        let now = Utc::now();
        let mut pool = vec![code(1, 30, now), code(2, 10, now), code(3, 20, now)];
        pool[1].response_id = Some(ResponseId::new(9));
        assert_eq!(select_allocatable(&pool, now), Some(2));

        pool[2].emailed_at = Some(now);
        assert_eq!(select_allocatable(&pool, now), Some(0));

        pool[0].expires_at = now;
        assert_eq!(select_allocatable(&pool, now), None);
    }

    #[test]
    fn parse_status_and_action() {
        assert_eq!("USED".parse::<CouponStatus>().unwrap(), CouponStatus::Used);
        assert!("gone".parse::<CouponStatus>().is_err());
        assert_eq!("emailed".parse::<MarkAction>().unwrap(), MarkAction::Emailed);
        assert_eq!(
            "printed".parse::<MarkAction>(),
            Err(ValidationError::UnknownMarkAction("printed".into()))
        );
    }

    proptest! {
        #[test]
        fn repeated_allocation_never_reuses_a_code(pool_size in 0usize..12, requests in 0usize..20) {
            let now = Utc::now();
            let mut pool: Vec<CouponCode> = (0..pool_size)
                .map(|i| code(i as i64, i as i64, now))
                .collect();
            let mut handed_out = std::collections::BTreeSet::new();
            let mut successes = 0usize;
            for r in 0..requests {
                if let Some(i) = select_allocatable(&pool, now) {
                    pool[i].assign(ResponseId::new(r as i64), now);
                    prop_assert!(handed_out.insert(pool[i].code.clone()));
                    successes += 1;
                }
            }
            prop_assert_eq!(successes, requests.min(pool_size));
        }
    }
}
