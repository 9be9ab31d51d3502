#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Account entitlement snapshots and the capability checker evaluated
//! against them.
//!
//! The checker is pure: no I/O, no clocks. Callers hand it an [`Account`]
//! and a [`HasCheck`] and get back either an outcome or an
//! [`InvalidCheck`] when the requirement itself is malformed.

pub mod account;
pub mod check;

pub use account::{
    Account, DailyUsage, FeatureFlags, PlanStatus, PlanType, QuotaName, Quotas,
};
pub use check::{CheckOutcome, DenyReason, Feature, HasCheck, InvalidCheck, check, has};
