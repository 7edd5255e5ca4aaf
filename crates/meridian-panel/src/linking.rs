//! Linking monthly security rows with annual datasets.
//!
//! Annual data for fiscal year `y` is only complete after `y` ends, so a
//! security row of calendar year `y + 1` is linked with fiscal year `y`.

use crate::fundamentals::NormalizedFundamentals;
use crate::security::{SecurityPanel, SecurityRecord};
use meridian_data::{EmissionsRecord, EntityId};
use std::collections::HashMap;
use tracing::debug;

/// Records keyed by entity and fiscal year.
pub trait AnnualRecord {
    /// Entity id
    fn entity_id(&self) -> &EntityId;

    /// Fiscal year
    fn fiscal_year(&self) -> i32;
}

impl AnnualRecord for NormalizedFundamentals {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn fiscal_year(&self) -> i32 {
        self.fiscal_year
    }
}

impl AnnualRecord for EmissionsRecord {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn fiscal_year(&self) -> i32 {
        self.fiscal_year
    }
}

/// A security row joined with the prior fiscal year's annual record.
#[derive(Debug, Clone, PartialEq)]
pub struct Linked<A> {
    /// Security row
    pub security: SecurityRecord,
    /// Annual record of `security.prior_year`
    pub annual: A,
}

/// Inner join of security rows with annual records on (entity, prior year).
///
/// Every matching annual record produces one linked row.
pub fn link_prior_year<A>(securities: &SecurityPanel, annual: &[A]) -> Vec<Linked<A>>
where
    A: AnnualRecord + Clone,
{
    let mut index: HashMap<(&EntityId, i32), Vec<&A>> = HashMap::new();
    for record in annual {
        index
            .entry((record.entity_id(), record.fiscal_year()))
            .or_default()
            .push(record);
    }

    let linked: Vec<Linked<A>> = securities
        .records()
        .iter()
        .flat_map(|security| {
            index
                .get(&(&security.entity_id, security.prior_year))
                .into_iter()
                .flatten()
                .map(|annual| Linked {
                    security: security.clone(),
                    annual: (*annual).clone(),
                })
        })
        .collect();

    debug!(
        securities = securities.len(),
        annual = annual.len(),
        linked = linked.len(),
        "linked on prior fiscal year"
    );
    linked
}
