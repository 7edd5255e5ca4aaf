//! Emissions records and their entity linking.
//!
//! Emissions are disclosed per company id and linked to entities through a
//! mapping table. Only bounded one-to-one mappings are trusted, so that no
//! entity receives redundant or conflicting emissions figures.

use crate::records::EntityId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Start flag of a mapping valid from the beginning of coverage.
pub const BOUNDED_START: &str = "B";

/// End flag of a mapping valid until the end of coverage.
pub const BOUNDED_END: &str = "E";

/// One row of the company id to entity id mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    /// Emissions company id
    pub company_id: Option<String>,
    /// Linked entity id
    pub entity_id: Option<EntityId>,
    /// Validity-start flag
    pub start_flag: Option<String>,
    /// Validity-end flag
    pub end_flag: Option<String>,
}

impl EntityMapping {
    /// Whether the mapping is a bounded one-to-one link.
    pub fn is_bounded(&self) -> bool {
        self.start_flag.as_deref() == Some(BOUNDED_START)
            && self.end_flag.as_deref() == Some(BOUNDED_END)
    }
}

/// Emissions disclosure as read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEmissionsRecord {
    /// Disclosing institution id
    pub institution_id: Option<String>,
    /// Company id
    pub company_id: Option<String>,
    /// Company name
    pub company_name: Option<String>,
    /// Linked entity id
    pub entity_id: Option<EntityId>,
    /// Fiscal year
    pub fiscal_year: Option<i32>,
    /// Period-end date
    pub period_end: Option<NaiveDate>,
    /// Emissions metrics by column name
    pub metrics: BTreeMap<String, Option<f64>>,
}

/// Emissions keyed by (entity, fiscal year), ready for linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionsRecord {
    /// Entity id
    pub entity_id: EntityId,
    /// Fiscal year
    pub fiscal_year: i32,
    /// Emissions metrics by column name
    pub metrics: BTreeMap<String, f64>,
}

/// Filter emissions down to entities with a bounded one-to-one mapping.
///
/// Rows without an entity id, rows whose entity has no bounded mapping and
/// rows with any missing field are dropped. The descriptive columns are not
/// carried into the result.
pub fn prepare_emissions(
    records: &[RawEmissionsRecord],
    mappings: &[EntityMapping],
) -> Vec<EmissionsRecord> {
    let bounded: HashSet<&EntityId> = mappings
        .iter()
        .filter(|m| m.is_bounded())
        .filter_map(|m| m.entity_id.as_ref())
        .collect();

    let prepared: Vec<EmissionsRecord> = records
        .iter()
        .filter_map(|record| {
            let entity_id = record.entity_id.as_ref()?;
            if !bounded.contains(entity_id) {
                return None;
            }
            record.institution_id.as_ref()?;
            record.company_id.as_ref()?;
            record.company_name.as_ref()?;
            record.period_end?;
            let fiscal_year = record.fiscal_year?;
            let metrics = record
                .metrics
                .iter()
                .map(|(name, value)| value.map(|v| (name.clone(), v)))
                .collect::<Option<BTreeMap<_, _>>>()?;
            Some(EmissionsRecord {
                entity_id: entity_id.clone(),
                fiscal_year,
                metrics,
            })
        })
        .collect();

    debug!(
        input = records.len(),
        bounded_entities = bounded.len(),
        kept = prepared.len(),
        "prepared emissions"
    );
    prepared
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entity: &str, start: &str, end: &str) -> EntityMapping {
        EntityMapping {
            company_id: Some(format!("C{entity}")),
            entity_id: Some(EntityId::new(entity)),
            start_flag: Some(start.to_string()),
            end_flag: Some(end.to_string()),
        }
    }

    fn record(entity: Option<&str>, scope1: Option<f64>) -> RawEmissionsRecord {
        RawEmissionsRecord {
            institution_id: Some("I1".to_string()),
            company_id: Some("C1".to_string()),
            company_name: Some("Acme".to_string()),
            entity_id: entity.map(EntityId::new),
            fiscal_year: Some(2020),
            period_end: NaiveDate::from_ymd_opt(2020, 12, 31),
            metrics: BTreeMap::from([("scope1".to_string(), scope1)]),
        }
    }

    #[test]
    fn test_only_bounded_mappings_link() {
        let mappings = vec![mapping("1", "B", "E"), mapping("2", "B", "2019-12-31")];
        let records = vec![
            record(Some("1"), Some(10.0)),
            record(Some("2"), Some(20.0)),
            record(None, Some(30.0)),
        ];

        let prepared = prepare_emissions(&records, &mappings);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].entity_id, EntityId::new("1"));
        assert_eq!(prepared[0].metrics["scope1"], 10.0);
    }

    #[test]
    fn test_missing_metric_drops_row() {
        let mappings = vec![mapping("1", "B", "E")];
        let records = vec![record(Some("0001"), None), record(Some("1"), Some(5.0))];

        let prepared = prepare_emissions(&records, &mappings);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].metrics["scope1"], 5.0);
    }
}
