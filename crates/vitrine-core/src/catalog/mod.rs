//! Static page and tier catalog.
//!
//! The catalog answers three questions for the engine: which tier a page
//! belongs to, which widgets a page renders, and which other locations a
//! location depends on. It is read-only once loaded.
//!
//! ```yaml
//! tiers:
//!   1:
//!     ttl_seconds: 300
//!     validation_frequency_minutes: 15
//!     pages: [strategy-plans]
//! pages:
//!   strategy-plans:
//!     widgets: [roadmap, maturity]
//!     related_pages: [analytics-insights]
//!   analytics-insights:
//!     widgets: [roadmap]
//! ```

mod page;
mod tier;

pub use page::PageConfig;
pub use tier::{MAX_TTL_SECONDS, TierConfig, TierTable};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Result, VitrineError};
use crate::key::CacheKey;
use crate::types::Tier;

/// A (page, widget) location scheduled for warming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub page: String,
    pub widget: String,
    pub tier: Tier,
    pub priority: u32,
}

/// Tier membership plus per-page configuration.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tiers: TierTable,
    pages: IndexMap<String, PageConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawCatalog {
    tiers: BTreeMap<u8, TierConfig>,
    pages: IndexMap<String, PageConfig>,
}

impl Catalog {
    /// Starts an empty catalog with default tier settings.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Parses a YAML catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogParse` for malformed YAML and `InvalidCatalog` when a
    /// tier number is out of range, a TTL is zero or too large, or a page is
    /// claimed by more than one tier.
    pub fn from_yaml_str(source_name: &str, content: &str) -> Result<Self> {
        let raw: RawCatalog = serde_yaml::from_str(content).map_err(|e| {
            VitrineError::catalog_parse_with_cause(source_name, "invalid YAML", e)
        })?;

        let mut builder = Self::builder();
        for (number, config) in raw.tiers {
            let tier = Tier::try_from(number)
                .map_err(|e| VitrineError::invalid_catalog("tiers", e.to_string()))?;
            builder = builder.tier(tier, config);
        }
        for (page, config) in raw.pages {
            builder = builder.page(page, config);
        }
        builder.build()
    }

    /// Reads and parses a YAML catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&path.display().to_string(), &content)
    }

    /// Canonical key for a location.
    pub fn resolve(&self, page: &str, widget: &str) -> CacheKey {
        CacheKey::new(page, widget)
    }

    /// Tier of a page, tier 3 when no tier claims it.
    pub fn tier_of(&self, page: &str) -> Tier {
        self.tiers.tier_of(&normalize(page))
    }

    pub fn tier_config(&self, tier: Tier) -> &TierConfig {
        self.tiers.get(tier)
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn page(&self, page: &str) -> Option<&PageConfig> {
        self.pages.get(&normalize(page))
    }

    /// Page ids in declaration order.
    pub fn pages(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    /// Keys `key` depends on: the same widget on every related page.
    /// Unknown pages have no dependencies.
    pub fn dependencies_of(&self, key: &CacheKey) -> Vec<CacheKey> {
        let Some(config) = self.pages.get(key.page()) else {
            return Vec::new();
        };

        let mut deps: Vec<CacheKey> = config
            .related_pages
            .iter()
            .map(|related| key.with_page(related))
            .filter(|dep| dep != key)
            .collect();
        deps.sort();
        deps.dedup();
        deps
    }

    /// Checks configured for a page; `None` selects every check.
    pub fn checks_for(&self, page: &str) -> Option<&[String]> {
        self.page(page).and_then(|config| config.checks.as_deref())
    }

    /// Every (page, widget) pair of the given tier, ordered by priority and
    /// then by declaration order.
    pub fn locations_in(&self, tier: Tier) -> Vec<Location> {
        let mut locations: Vec<Location> = self
            .tiers
            .get(tier)
            .pages
            .iter()
            .filter_map(|page| self.pages.get_full(page))
            .flat_map(|(index, page, config)| {
                let priority = config.priority.unwrap_or(index as u32);
                config.widgets.iter().map(move |widget| Location {
                    page: page.clone(),
                    widget: normalize(widget),
                    tier,
                    priority,
                })
            })
            .collect();
        locations.sort_by_key(|location| location.priority);
        locations
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Builder for [`Catalog`]. Page ids are normalized like cache keys.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    tiers: TierTable,
    pages: IndexMap<String, PageConfig>,
}

impl CatalogBuilder {
    /// Replaces the settings of one tier.
    pub fn tier(mut self, tier: Tier, config: TierConfig) -> Self {
        *self.tiers.get_mut(tier) = config;
        self
    }

    /// Adds or replaces a page.
    pub fn page(mut self, page: impl AsRef<str>, config: PageConfig) -> Self {
        self.pages.insert(normalize(page.as_ref()), config);
        self
    }

    /// Validates and builds the catalog.
    pub fn build(mut self) -> Result<Catalog> {
        let mut claimed: HashMap<String, Tier> = HashMap::new();

        for tier in Tier::ALL {
            let config = self.tiers.get_mut(tier);
            if config.ttl_seconds == 0 || config.ttl_seconds > MAX_TTL_SECONDS {
                return Err(VitrineError::invalid_catalog(
                    "tiers",
                    format!("{tier} ttl_seconds must be between 1 and {MAX_TTL_SECONDS}"),
                ));
            }
            if config.validation_frequency_minutes == 0 {
                return Err(VitrineError::invalid_catalog(
                    "tiers",
                    format!("{tier} validation_frequency_minutes must be positive"),
                ));
            }

            config.pages = config.pages.iter().map(|p| normalize(p)).collect();
            for page in &config.pages {
                if let Some(previous) = claimed.insert(page.clone(), tier)
                    && previous != tier
                {
                    return Err(VitrineError::invalid_catalog(
                        "tiers",
                        format!("page '{page}' is listed in both {previous} and {tier}"),
                    ));
                }
            }
        }

        for config in self.pages.values_mut() {
            config.related_pages = config.related_pages.iter().map(|p| normalize(p)).collect();
        }

        Ok(Catalog {
            tiers: self.tiers,
            pages: self.pages,
        })
    }
}
