#![allow(dead_code)]
use vitrine_core::Catalog;

/// Catalog with a three-page dependency chain used across tests:
/// `roadmap-detail -> strategy -> overview` (each depends on the next).
pub fn chain_catalog() -> Catalog {
    Catalog::from_yaml_str("chain", CHAIN_YAML).expect("Failed to parse test catalog")
}

pub const CHAIN_YAML: &str = r#"
tiers:
  1:
    ttl_seconds: 300
    validation_frequency_minutes: 15
    pages: [overview, strategy]
  2:
    ttl_seconds: 900
    validation_frequency_minutes: 60
    pages: [roadmap-detail]
pages:
  overview:
    widgets: [summary, kpis]
  strategy:
    widgets: [summary]
    related_pages: [overview]
  roadmap-detail:
    widgets: [summary]
    related_pages: [strategy, overview]
"#;
