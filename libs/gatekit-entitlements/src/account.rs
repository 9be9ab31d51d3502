use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Commercial plan tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Free,
    Starter,
    Pro,
    Agency,
    Enterprise,
}

impl PlanType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Agency => "agency",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing status of an account's plan.
///
/// Only [`PlanStatus::Active`] permits mutations; every other status is
/// reported as a billing issue by the workspace resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    Paused,
}

impl PlanStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Incomplete => "incomplete",
            Self::Paused => "paused",
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean feature flags plus the set of preview programs the account
/// opted into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)] // one field per downstream flag
pub struct FeatureFlags {
    pub custom_domains: bool,
    pub remove_branding: bool,
    pub analytics: bool,
    pub form_submissions: bool,
    pub ecommerce: bool,
    pub api_access: bool,
    pub team_collaboration: bool,
    /// Preview opt-in keys. Absent in the payload means "none".
    #[serde(default)]
    pub previews: BTreeSet<String>,
}

/// Counters for usage accumulated during the current day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    pub publishes: u64,
    pub ai_generations: u64,
}

/// Names of the quotas an account can be limited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuotaName {
    Sites,
    TeamSeats,
    DailyPublishes,
    DailyAiGenerations,
}

/// Configured quota limits. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quotas {
    pub sites: Option<u64>,
    pub team_seats: Option<u64>,
    pub daily_publishes: Option<u64>,
    pub daily_ai_generations: Option<u64>,
}

impl Quotas {
    /// Every quota pinned to zero.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            sites: Some(0),
            team_seats: Some(0),
            daily_publishes: Some(0),
            daily_ai_generations: Some(0),
        }
    }

    /// Limit configured for `quota`, `None` when unlimited.
    #[must_use]
    pub const fn limit(&self, quota: QuotaName) -> Option<u64> {
        match quota {
            QuotaName::Sites => self.sites,
            QuotaName::TeamSeats => self.team_seats,
            QuotaName::DailyPublishes => self.daily_publishes,
            QuotaName::DailyAiGenerations => self.daily_ai_generations,
        }
    }
}

/// Full entitlement snapshot of one account.
///
/// Immutable for the lifetime of one bootstrap; a fresh snapshot is only
/// obtained by bootstrapping again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub plan_type: PlanType,
    pub plan_status: PlanStatus,
    pub feature_flags: FeatureFlags,
    pub daily_usage: DailyUsage,
    pub quotas: Quotas,
}

impl Account {
    /// Snapshot granting nothing beyond the plan claims: every flag off,
    /// no previews, zero usage and zero quotas.
    ///
    /// Used when the downstream refuses to hand out the full snapshot but
    /// the token exchange itself succeeded.
    #[must_use]
    pub fn minimal(
        account_id: impl Into<String>,
        plan_type: PlanType,
        plan_status: PlanStatus,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            plan_type,
            plan_status,
            feature_flags: FeatureFlags::default(),
            daily_usage: DailyUsage::default(),
            quotas: Quotas::zeroed(),
        }
    }
}
