//! Declarative capability requirements and their evaluation.
//!
//! A [`HasCheck`] names exactly one requirement. [`check`] evaluates it
//! against an [`Account`] and reports a structured [`DenyReason`] on
//! failure, so callers can render context-specific messages without
//! matching on strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{Account, FeatureFlags, PlanStatus, PlanType, QuotaName};

/// Product features gated by a boolean flag on the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    CustomDomains,
    RemoveBranding,
    Analytics,
    FormSubmissions,
    Ecommerce,
    ApiAccess,
    TeamCollaboration,
}

impl Feature {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomDomains => "custom-domains",
            Self::RemoveBranding => "remove-branding",
            Self::Analytics => "analytics",
            Self::FormSubmissions => "form-submissions",
            Self::Ecommerce => "ecommerce",
            Self::ApiAccess => "api-access",
            Self::TeamCollaboration => "team-collaboration",
        }
    }

    /// Key of the downstream flag backing this feature.
    #[must_use]
    pub const fn flag_key(self) -> &'static str {
        match self {
            Self::CustomDomains => "customDomains",
            Self::RemoveBranding => "removeBranding",
            Self::Analytics => "analytics",
            Self::FormSubmissions => "formSubmissions",
            Self::Ecommerce => "ecommerce",
            Self::ApiAccess => "apiAccess",
            Self::TeamCollaboration => "teamCollaboration",
        }
    }

    #[must_use]
    pub const fn is_enabled(self, flags: &FeatureFlags) -> bool {
        match self {
            Self::CustomDomains => flags.custom_domains,
            Self::RemoveBranding => flags.remove_branding,
            Self::Analytics => flags.analytics,
            Self::FormSubmissions => flags.form_submissions,
            Self::Ecommerce => flags.ecommerce,
            Self::ApiAccess => flags.api_access,
            Self::TeamCollaboration => flags.team_collaboration,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for QuotaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sites => "sites",
            Self::TeamSeats => "teamSeats",
            Self::DailyPublishes => "dailyPublishes",
            Self::DailyAiGenerations => "dailyAiGenerations",
        })
    }
}

/// A single capability requirement.
///
/// Serialized externally tagged, e.g. `{"plan":["pro","agency"]}` or
/// `{"quotaWithin":{"quota":"sites","value":3}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HasCheck {
    /// Plan type is one of the listed values.
    Plan(Vec<PlanType>),
    /// Plan status is one of the listed values.
    Status(Vec<PlanStatus>),
    Feature(Feature),
    AnyFeature(Vec<Feature>),
    AllFeatures(Vec<Feature>),
    /// Account opted into the named preview.
    Preview(String),
    AnyPreview(Vec<String>),
    AllPreviews(Vec<String>),
    /// A proposed value fits under the account's limit for `quota`.
    QuotaWithin { quota: QuotaName, value: f64 },
}

impl HasCheck {
    /// Tag of the variant as it appears on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Plan(_) => "plan",
            Self::Status(_) => "status",
            Self::Feature(_) => "feature",
            Self::AnyFeature(_) => "anyFeature",
            Self::AllFeatures(_) => "allFeatures",
            Self::Preview(_) => "preview",
            Self::AnyPreview(_) => "anyPreview",
            Self::AllPreviews(_) => "allPreviews",
            Self::QuotaWithin { .. } => "quotaWithin",
        }
    }

    /// Rejects requirements that cannot be evaluated meaningfully.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCheck`] for an empty value list, an empty preview
    /// key, or a negative / non-finite quota value.
    pub fn validate(&self) -> Result<(), InvalidCheck> {
        let empty = match self {
            Self::Plan(v) => v.is_empty(),
            Self::Status(v) => v.is_empty(),
            Self::AnyFeature(v) | Self::AllFeatures(v) => v.is_empty(),
            Self::AnyPreview(v) | Self::AllPreviews(v) => v.is_empty(),
            Self::Preview(key) => {
                if key.is_empty() {
                    return Err(InvalidCheck::EmptyPreviewKey);
                }
                false
            }
            Self::QuotaWithin { quota, value } => {
                if !value.is_finite() || *value < 0.0 {
                    return Err(InvalidCheck::InvalidQuotaValue {
                        quota: *quota,
                        value: *value,
                    });
                }
                false
            }
            Self::Feature(_) => false,
        };

        if empty {
            return Err(InvalidCheck::EmptyList { check: self.kind() });
        }
        Ok(())
    }
}

/// Malformed requirement. This is a bug at the call site, never an
/// authorization outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCheck {
    #[error("`{check}` requirement needs at least one value")]
    EmptyList { check: &'static str },

    #[error("`preview` requirement needs a non-empty key")]
    EmptyPreviewKey,

    #[error("`quotaWithin` value for {quota} must be finite and non-negative, got {value}")]
    InvalidQuotaValue { quota: QuotaName, value: f64 },
}

/// Why a requirement was not met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DenyReason {
    PlanNotAllowed {
        required: Vec<PlanType>,
        actual: PlanType,
    },
    StatusNotAllowed {
        required: Vec<PlanStatus>,
        actual: PlanStatus,
    },
    FeatureDisabled {
        feature: Feature,
    },
    NoFeatureEnabled {
        features: Vec<Feature>,
    },
    FeaturesDisabled {
        missing: Vec<Feature>,
    },
    PreviewNotEnabled {
        preview: String,
    },
    NoPreviewEnabled {
        previews: Vec<String>,
    },
    PreviewsNotEnabled {
        missing: Vec<String>,
    },
    QuotaExceeded {
        quota: QuotaName,
        limit: u64,
        value: f64,
    },
}

/// Result of evaluating a well-formed requirement.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Allowed,
    Denied(DenyReason),
}

impl CheckOutcome {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    #[must_use]
    pub const fn reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(reason),
        }
    }

    fn deny_unless(allowed: bool, reason: impl FnOnce() -> DenyReason) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::Denied(reason())
        }
    }
}

/// Evaluate `requirement` against `account`.
///
/// # Errors
///
/// Returns [`InvalidCheck`] before evaluation when the requirement is
/// malformed (see [`HasCheck::validate`]).
pub fn check(account: &Account, requirement: &HasCheck) -> Result<CheckOutcome, InvalidCheck> {
    requirement.validate()?;

    let flags = &account.feature_flags;
    let outcome = match requirement {
        HasCheck::Plan(plans) => {
            CheckOutcome::deny_unless(plans.contains(&account.plan_type), || {
                DenyReason::PlanNotAllowed {
                    required: plans.clone(),
                    actual: account.plan_type,
                }
            })
        }
        HasCheck::Status(statuses) => {
            CheckOutcome::deny_unless(statuses.contains(&account.plan_status), || {
                DenyReason::StatusNotAllowed {
                    required: statuses.clone(),
                    actual: account.plan_status,
                }
            })
        }
        HasCheck::Feature(feature) => {
            CheckOutcome::deny_unless(feature.is_enabled(flags), || {
                DenyReason::FeatureDisabled { feature: *feature }
            })
        }
        HasCheck::AnyFeature(features) => {
            CheckOutcome::deny_unless(features.iter().any(|f| f.is_enabled(flags)), || {
                DenyReason::NoFeatureEnabled {
                    features: features.clone(),
                }
            })
        }
        HasCheck::AllFeatures(features) => {
            let missing: Vec<Feature> = features
                .iter()
                .copied()
                .filter(|f| !f.is_enabled(flags))
                .collect();
            CheckOutcome::deny_unless(missing.is_empty(), || DenyReason::FeaturesDisabled {
                missing,
            })
        }
        HasCheck::Preview(preview) => {
            CheckOutcome::deny_unless(flags.previews.contains(preview), || {
                DenyReason::PreviewNotEnabled {
                    preview: preview.clone(),
                }
            })
        }
        HasCheck::AnyPreview(previews) => CheckOutcome::deny_unless(
            previews.iter().any(|p| flags.previews.contains(p)),
            || DenyReason::NoPreviewEnabled {
                previews: previews.clone(),
            },
        ),
        HasCheck::AllPreviews(previews) => {
            let missing: Vec<String> = previews
                .iter()
                .filter(|p| !flags.previews.contains(*p))
                .cloned()
                .collect();
            CheckOutcome::deny_unless(missing.is_empty(), || DenyReason::PreviewsNotEnabled {
                missing,
            })
        }
        HasCheck::QuotaWithin { quota, value } => match account.quotas.limit(*quota) {
            None => CheckOutcome::Allowed,
            Some(limit) => {
                // Limits are small counters, far below f64's exact-integer range.
                #[allow(clippy::cast_precision_loss)]
                let within = *value <= limit as f64;
                CheckOutcome::deny_unless(within, || DenyReason::QuotaExceeded {
                    quota: *quota,
                    limit,
                    value: *value,
                })
            }
        },
    };

    Ok(outcome)
}

/// Boolean convenience over [`check`].
///
/// # Panics
///
/// Panics when `requirement` is malformed. A malformed requirement is a
/// programming error and must not be mistaken for a denial; use [`check`]
/// when the requirement comes from untrusted input.
#[must_use]
pub fn has(account: &Account, requirement: &HasCheck) -> bool {
    match check(account, requirement) {
        Ok(outcome) => outcome.is_allowed(),
        Err(err) => panic!("invalid capability requirement: {err}"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::account::{DailyUsage, Quotas};

    fn account() -> Account {
        Account {
            account_id: "acc_1".to_owned(),
            plan_type: PlanType::Pro,
            plan_status: PlanStatus::Active,
            feature_flags: FeatureFlags {
                custom_domains: true,
                analytics: true,
                previews: ["ai-layouts".to_owned()].into_iter().collect(),
                ..FeatureFlags::default()
            },
            daily_usage: DailyUsage {
                publishes: 4,
                ai_generations: 0,
            },
            quotas: Quotas {
                sites: Some(5),
                team_seats: None,
                daily_publishes: Some(20),
                daily_ai_generations: Some(0),
            },
        }
    }

    #[test]
    fn plan_membership() {
        let acc = account();
        assert!(has(&acc, &HasCheck::Plan(vec![PlanType::Pro, PlanType::Agency])));

        let outcome = check(&acc, &HasCheck::Plan(vec![PlanType::Enterprise])).unwrap();
        assert_eq!(
            outcome.reason(),
            Some(&DenyReason::PlanNotAllowed {
                required: vec![PlanType::Enterprise],
                actual: PlanType::Pro,
            })
        );
    }

    #[test]
    fn status_membership() {
        let acc = account();
        assert!(has(&acc, &HasCheck::Status(vec![PlanStatus::Active])));
        assert!(!has(
            &acc,
            &HasCheck::Status(vec![PlanStatus::PastDue, PlanStatus::Unpaid])
        ));
    }

    #[test]
    fn single_feature_reads_mapped_flag() {
        let acc = account();
        assert!(has(&acc, &HasCheck::Feature(Feature::CustomDomains)));

        let outcome = check(&acc, &HasCheck::Feature(Feature::ApiAccess)).unwrap();
        assert_eq!(
            outcome,
            CheckOutcome::Denied(DenyReason::FeatureDisabled {
                feature: Feature::ApiAccess
            })
        );
    }

    #[test]
    fn any_and_all_features() {
        let acc = account();
        assert!(has(
            &acc,
            &HasCheck::AnyFeature(vec![Feature::Ecommerce, Feature::Analytics])
        ));
        assert!(!has(
            &acc,
            &HasCheck::AnyFeature(vec![Feature::Ecommerce, Feature::ApiAccess])
        ));

        let outcome = check(
            &acc,
            &HasCheck::AllFeatures(vec![
                Feature::CustomDomains,
                Feature::Ecommerce,
                Feature::ApiAccess,
            ]),
        )
        .unwrap();
        assert_eq!(
            outcome.reason(),
            Some(&DenyReason::FeaturesDisabled {
                missing: vec![Feature::Ecommerce, Feature::ApiAccess]
            })
        );
    }

    #[test]
    fn previews() {
        let acc = account();
        assert!(has(&acc, &HasCheck::Preview("ai-layouts".to_owned())));
        assert!(!has(&acc, &HasCheck::Preview("blog-v2".to_owned())));
        assert!(has(
            &acc,
            &HasCheck::AnyPreview(vec!["blog-v2".to_owned(), "ai-layouts".to_owned()])
        ));

        let outcome = check(
            &acc,
            &HasCheck::AllPreviews(vec!["blog-v2".to_owned(), "ai-layouts".to_owned()]),
        )
        .unwrap();
        assert_eq!(
            outcome.reason(),
            Some(&DenyReason::PreviewsNotEnabled {
                missing: vec!["blog-v2".to_owned()]
            })
        );
    }

    #[test]
    fn quota_unlimited_passes_any_value() {
        let acc = account();
        for value in [0.0, 1.0, 1_000_000.0] {
            assert!(has(
                &acc,
                &HasCheck::QuotaWithin {
                    quota: QuotaName::TeamSeats,
                    value,
                }
            ));
        }
    }

    #[test]
    fn quota_passes_iff_value_at_most_limit() {
        let acc = account();
        let within = |value| {
            has(
                &acc,
                &HasCheck::QuotaWithin {
                    quota: QuotaName::Sites,
                    value,
                },
            )
        };
        assert!(within(0.0));
        assert!(within(4.5));
        assert!(within(5.0));
        assert!(!within(5.5));
        assert!(!within(6.0));

        let outcome = check(
            &acc,
            &HasCheck::QuotaWithin {
                quota: QuotaName::DailyAiGenerations,
                value: 1.0,
            },
        )
        .unwrap();
        assert_eq!(
            outcome.reason(),
            Some(&DenyReason::QuotaExceeded {
                quota: QuotaName::DailyAiGenerations,
                limit: 0,
                value: 1.0,
            })
        );
    }

    #[test]
    fn empty_lists_are_rejected_before_evaluation() {
        let acc = account();
        let empties = [
            HasCheck::Plan(vec![]),
            HasCheck::Status(vec![]),
            HasCheck::AnyFeature(vec![]),
            HasCheck::AllFeatures(vec![]),
            HasCheck::AnyPreview(vec![]),
            HasCheck::AllPreviews(vec![]),
        ];
        for requirement in &empties {
            assert_eq!(
                check(&acc, requirement),
                Err(InvalidCheck::EmptyList {
                    check: requirement.kind()
                })
            );
        }
        assert_eq!(
            check(&acc, &HasCheck::Preview(String::new())),
            Err(InvalidCheck::EmptyPreviewKey)
        );
    }

    #[test]
    fn negative_or_non_finite_quota_values_are_rejected() {
        let acc = account();
        for value in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = check(
                &acc,
                &HasCheck::QuotaWithin {
                    quota: QuotaName::TeamSeats,
                    value,
                },
            );
            assert!(
                matches!(result, Err(InvalidCheck::InvalidQuotaValue { .. })),
                "value {value} should be rejected"
            );
        }
    }

    #[test]
    #[should_panic(expected = "invalid capability requirement")]
    fn has_panics_on_malformed_requirement() {
        assert!(!has(&account(), &HasCheck::AllFeatures(vec![])));
    }
}
