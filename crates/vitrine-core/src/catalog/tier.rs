use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::Tier;

/// Longest TTL a tier may declare (ten years).
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// TTL and validation cadence of one tier, plus the pages it claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub ttl_seconds: u64,
    pub validation_frequency_minutes: u32,
    #[serde(default)]
    pub pages: Vec<String>,
}

impl TierConfig {
    pub fn new(ttl_seconds: u64, validation_frequency_minutes: u32) -> Self {
        Self {
            ttl_seconds,
            validation_frequency_minutes,
            pages: Vec::new(),
        }
    }

    /// Adds a page to this tier.
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.pages.push(page.into());
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_seconds.min(MAX_TTL_SECONDS) as i64)
    }

    pub fn validation_frequency(&self) -> Duration {
        Duration::minutes(i64::from(self.validation_frequency_minutes))
    }

    /// Default settings for a tier with no pages assigned.
    pub fn default_for(tier: Tier) -> Self {
        match tier {
            Tier::One => Self::new(300, 15),
            Tier::Two => Self::new(900, 60),
            Tier::Three => Self::new(3600, 240),
        }
    }
}

/// The three tiers, indexed by [`Tier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    tiers: [TierConfig; 3],
}

impl TierTable {
    pub fn new(one: TierConfig, two: TierConfig, three: TierConfig) -> Self {
        Self {
            tiers: [one, two, three],
        }
    }

    pub fn get(&self, tier: Tier) -> &TierConfig {
        &self.tiers[usize::from(tier.number() - 1)]
    }

    pub(crate) fn get_mut(&mut self, tier: Tier) -> &mut TierConfig {
        &mut self.tiers[usize::from(tier.number() - 1)]
    }

    /// Membership lookup; pages no tier claims are tier 3.
    pub fn tier_of(&self, page: &str) -> Tier {
        Tier::ALL
            .into_iter()
            .find(|tier| self.get(*tier).pages.iter().any(|p| p == page))
            .unwrap_or(Tier::Three)
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::new(
            TierConfig::default_for(Tier::One),
            TierConfig::default_for(Tier::Two),
            TierConfig::default_for(Tier::Three),
        )
    }
}
