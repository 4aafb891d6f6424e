use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ProviderSeed;

/// Provider health/usage status
///
/// ```text
///            success (used < limit)              failures >= max_errors
///   ┌────────────────────────────┐   ┌────────────────────────────────────┐
///   │                            ▼   │                                    ▼
/// QuotaExceeded ◄── success ── Active ─────────────────────────────────► Error
///   (used >= limit)               ▲  ▲                                    │
///                                 │  └─────── success / reset_quota ──────┘
///        Disabled ─── enable ─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Active,
    Disabled,
    QuotaExceeded,
    Error,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Active => "active",
            ProviderStatus::Disabled => "disabled",
            ProviderStatus::QuotaExceeded => "quota_exceeded",
            ProviderStatus::Error => "error",
        }
    }

    /// Status a provider starts in before any outcome has been recorded
    pub fn initial(enabled: bool, credential: &str) -> Self {
        if enabled && !credential.is_empty() {
            ProviderStatus::Active
        } else {
            ProviderStatus::Disabled
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First moment (UTC) of the calendar month following `now`.
pub fn next_period_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// One external provider (or local strategy) with its own quota,
/// credential and health.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub credential: String,
    pub quota_limit: u64,
    pub used_count: u64,
    pub priority: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub status: ProviderStatus,
    pub error_count: u32,
    pub max_errors: u32,
    pub quota_reset_at: DateTime<Utc>,
}

impl ProviderConfig {
    /// Build a fresh provider from a configured seed.
    pub fn from_seed(seed: &ProviderSeed, now: DateTime<Utc>) -> Self {
        let mut provider = Self {
            id: seed.id.clone(),
            name: seed.name.clone(),
            enabled: seed.enabled,
            credential: seed.credential.clone(),
            quota_limit: seed.quota_limit,
            used_count: 0,
            priority: seed.priority,
            last_used_at: None,
            status: ProviderStatus::initial(seed.enabled, &seed.credential),
            error_count: 0,
            max_errors: seed.max_errors,
            quota_reset_at: next_period_boundary(now),
        };
        // A zero quota or zero error budget must not start out active
        provider.reconcile_status();
        provider
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.is_empty()
    }

    pub fn is_within_quota(&self) -> bool {
        self.used_count < self.quota_limit
    }

    pub fn is_below_error_threshold(&self) -> bool {
        self.error_count < self.max_errors
    }

    /// Selection predicate used by the registry.
    pub fn is_eligible(&self) -> bool {
        self.enabled
            && self.status == ProviderStatus::Active
            && self.has_credential()
            && self.is_within_quota()
            && self.is_below_error_threshold()
    }

    /// Whether the quota period has rolled over at `now`.
    pub fn is_quota_reset_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.quota_reset_at
    }

    /// Record a successful call. Returns the previous status.
    ///
    /// The quota check dominates: a success that reaches the limit leaves the
    /// provider `QuotaExceeded` even if it was `Error` before.
    pub fn apply_success(&mut self, now: DateTime<Utc>) -> ProviderStatus {
        let previous = self.status;
        self.used_count = self.used_count.saturating_add(1);
        self.error_count = 0;
        self.last_used_at = Some(now);

        if !self.is_within_quota() {
            self.status = ProviderStatus::QuotaExceeded;
        } else if matches!(
            previous,
            ProviderStatus::Error | ProviderStatus::QuotaExceeded
        ) {
            self.status = ProviderStatus::Active;
        }

        previous
    }

    /// Record a failed call. Returns the previous status.
    pub fn apply_failure(&mut self, now: DateTime<Utc>) -> ProviderStatus {
        let previous = self.status;
        self.error_count = self.error_count.saturating_add(1);
        self.last_used_at = Some(now);

        if !self.is_below_error_threshold() {
            self.status = ProviderStatus::Error;
        }

        previous
    }

    pub fn apply_enable(&mut self) -> ProviderStatus {
        let previous = self.status;
        self.enabled = true;
        self.status = ProviderStatus::Active;
        self.error_count = 0;
        self.reconcile_status();
        previous
    }

    pub fn apply_disable(&mut self) -> ProviderStatus {
        let previous = self.status;
        self.enabled = false;
        self.status = ProviderStatus::Disabled;
        previous
    }

    pub fn apply_quota_reset(&mut self, now: DateTime<Utc>) -> ProviderStatus {
        let previous = self.status;
        self.used_count = 0;
        self.error_count = 0;
        // An operator-disabled provider stays disabled across period rollover
        self.status = if self.enabled {
            ProviderStatus::Active
        } else {
            ProviderStatus::Disabled
        };
        self.quota_reset_at = next_period_boundary(now);
        self.reconcile_status();
        previous
    }

    pub fn apply_credential(&mut self, credential: String) -> ProviderStatus {
        let previous = self.status;
        self.status = if credential.is_empty() {
            ProviderStatus::Disabled
        } else {
            ProviderStatus::Active
        };
        self.credential = credential;
        self.error_count = 0;
        self.reconcile_status();
        previous
    }

    /// Bring `status` back in line with the counters after an operator edit.
    ///
    /// Only `Active` and `QuotaExceeded` move here; `Disabled` is an operator
    /// decision and `Error` is cleared by a success or a reset.
    pub fn reconcile_status(&mut self) {
        match self.status {
            ProviderStatus::Active => {
                if !self.is_within_quota() {
                    self.status = ProviderStatus::QuotaExceeded;
                } else if !self.is_below_error_threshold() {
                    self.status = ProviderStatus::Error;
                }
            }
            ProviderStatus::QuotaExceeded => {
                if self.is_within_quota() && self.enabled && self.has_credential() {
                    self.status = if self.is_below_error_threshold() {
                        ProviderStatus::Active
                    } else {
                        ProviderStatus::Error
                    };
                }
            }
            ProviderStatus::Disabled | ProviderStatus::Error => {}
        }
    }

    pub fn stats(&self) -> ProviderStats {
        let usage_fraction = if self.quota_limit == 0 {
            1.0
        } else {
            self.used_count as f64 / self.quota_limit as f64
        };

        ProviderStats {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            enabled: self.enabled,
            has_credential: self.has_credential(),
            used_count: self.used_count,
            quota_limit: self.quota_limit,
            remaining: self.quota_limit.saturating_sub(self.used_count),
            usage_fraction,
            error_count: self.error_count,
            max_errors: self.max_errors,
            last_used_at: self.last_used_at,
            quota_reset_at: self.quota_reset_at,
        }
    }
}

/// Per-provider statistics exposed to the surrounding application
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStats {
    pub id: String,
    pub name: String,
    pub status: ProviderStatus,
    pub enabled: bool,
    pub has_credential: bool,
    pub used_count: u64,
    pub quota_limit: u64,
    pub remaining: u64,
    /// `used_count / quota_limit`; a zero limit reports as fully used
    pub usage_fraction: f64,
    pub error_count: u32,
    pub max_errors: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub quota_reset_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 15, 12, 59, 0).unwrap()
    }

    pub(crate) fn create_test_provider(id: &str, priority: i64) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            enabled: true,
            credential: "key-123".to_string(),
            quota_limit: 10,
            used_count: 0,
            priority,
            last_used_at: None,
            status: ProviderStatus::Active,
            error_count: 0,
            max_errors: 3,
            quota_reset_at: next_period_boundary(test_now()),
        }
    }

    #[test]
    fn test_next_period_boundary_mid_month() {
        let boundary = next_period_boundary(test_now());
        assert_eq!(boundary, Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_period_boundary_december_rolls_year() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let boundary = next_period_boundary(now);
        assert_eq!(boundary, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_period_boundary_on_boundary_moves_forward() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let boundary = next_period_boundary(now);
        assert_eq!(boundary, Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(ProviderStatus::initial(true, "key"), ProviderStatus::Active);
        assert_eq!(ProviderStatus::initial(true, ""), ProviderStatus::Disabled);
        assert_eq!(ProviderStatus::initial(false, "key"), ProviderStatus::Disabled);
    }

    #[test]
    fn test_success_crossing_quota_is_quota_exceeded() {
        let mut provider = create_test_provider("p", 1);
        provider.quota_limit = 1;
        provider.status = ProviderStatus::Error;
        provider.error_count = 3;

        let previous = provider.apply_success(test_now());

        assert_eq!(previous, ProviderStatus::Error);
        assert_eq!(provider.status, ProviderStatus::QuotaExceeded);
        assert_eq!(provider.error_count, 0);
        assert_eq!(provider.used_count, 1);
        assert_eq!(provider.last_used_at, Some(test_now()));
    }

    #[test]
    fn test_success_restores_active_from_error() {
        let mut provider = create_test_provider("p", 1);
        provider.status = ProviderStatus::Error;
        provider.error_count = 3;

        provider.apply_success(test_now());

        assert_eq!(provider.status, ProviderStatus::Active);
        assert!(provider.is_eligible());
    }

    #[test]
    fn test_success_does_not_revive_disabled() {
        let mut provider = create_test_provider("p", 1);
        provider.apply_disable();

        provider.apply_success(test_now());

        assert_eq!(provider.status, ProviderStatus::Disabled);
        assert!(!provider.is_eligible());
    }

    #[test]
    fn test_failures_trip_error_status() {
        let mut provider = create_test_provider("p", 1);

        provider.apply_failure(test_now());
        provider.apply_failure(test_now());
        assert_eq!(provider.status, ProviderStatus::Active);

        provider.apply_failure(test_now());
        assert_eq!(provider.status, ProviderStatus::Error);
        assert_eq!(provider.error_count, 3);
        assert!(!provider.is_eligible());
    }

    #[test]
    fn test_enable_over_quota_stays_quota_exceeded() {
        let mut provider = create_test_provider("p", 1);
        provider.used_count = provider.quota_limit;
        provider.apply_disable();

        provider.apply_enable();

        assert!(provider.enabled);
        assert_eq!(provider.status, ProviderStatus::QuotaExceeded);
    }

    #[test]
    fn test_disable_preserves_error_count() {
        let mut provider = create_test_provider("p", 1);
        provider.apply_failure(test_now());
        provider.apply_disable();
        assert_eq!(provider.error_count, 1);
        assert_eq!(provider.status, ProviderStatus::Disabled);
    }

    #[test]
    fn test_empty_credential_disables() {
        let mut provider = create_test_provider("p", 1);
        provider.error_count = 2;

        provider.apply_credential(String::new());

        assert_eq!(provider.status, ProviderStatus::Disabled);
        assert_eq!(provider.error_count, 0);
    }

    #[test]
    fn test_reconcile_after_limit_raise() {
        let mut provider = create_test_provider("p", 1);
        provider.used_count = 10;
        provider.status = ProviderStatus::QuotaExceeded;

        provider.quota_limit = 20;
        provider.reconcile_status();

        assert_eq!(provider.status, ProviderStatus::Active);
    }

    #[test]
    fn test_stats_zero_limit_reports_full_usage() {
        let mut provider = create_test_provider("p", 1);
        provider.quota_limit = 0;

        let stats = provider.stats();
        assert_eq!(stats.usage_fraction, 1.0);
        assert_eq!(stats.remaining, 0);
    }

    #[test]
    fn test_stats_usage_fraction() {
        let mut provider = create_test_provider("p", 1);
        provider.used_count = 4;
        let stats = provider.stats();
        assert!((stats.usage_fraction - 0.4).abs() < f64::EPSILON);
        assert_eq!(stats.remaining, 6);
    }
}
