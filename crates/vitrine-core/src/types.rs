//! Common type definitions for Vitrine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::VitrineError;

/// Freshness class of a page.
///
/// Tier 1 pages get the shortest TTL and the tightest validation cadence.
/// Pages that no tier claims are treated as [`Tier::Three`].
///
/// # Example
///
/// ```
/// use vitrine_core::Tier;
///
/// assert_eq!(Tier::try_from(1).unwrap(), Tier::One);
/// assert_eq!(Tier::default(), Tier::Three);
/// assert!(Tier::try_from(4).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    One,
    Two,
    #[default]
    Three,
}

impl Tier {
    /// All tiers, highest priority first.
    pub const ALL: [Tier; 3] = [Tier::One, Tier::Two, Tier::Three];

    /// Returns the numeric tier (1, 2 or 3).
    pub fn number(self) -> u8 {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = VitrineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::One),
            2 => Ok(Tier::Two),
            3 => Ok(Tier::Three),
            other => Err(VitrineError::UnknownTier(other)),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.number()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.number())
    }
}

/// Where a piece of cached content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Freshly computed from the authoritative upstream.
    AuthoritativeFresh,
    /// Served from the authoritative upstream's own cache.
    AuthoritativeCached,
    /// Produced by the generator without upstream data.
    GeneratorOnly,
    /// Static content used when nothing better is available.
    StaticFallback,
}

impl SourceKind {
    /// Returns the snake_case label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::AuthoritativeFresh => "authoritative_fresh",
            SourceKind::AuthoritativeCached => "authoritative_cached",
            SourceKind::GeneratorOnly => "generator_only",
            SourceKind::StaticFallback => "static_fallback",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation state of a durable record.
///
/// Allowed transitions: `Valid -> Validating -> {Valid, Invalid}`, and
/// any state may move to `Invalid` through direct invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Validating,
    Invalid,
}

impl ValidationStatus {
    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ValidationStatus) -> bool {
        use ValidationStatus::*;
        matches!(
            (self, next),
            (Valid, Validating) | (Validating, Valid) | (_, Invalid)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Validating => "validating",
            ValidationStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
