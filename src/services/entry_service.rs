//! Scope entry service
//!
//! Turns a submitted entry form into a validated, calculated entry ready for the
//! store. Factor lookups go through a [`FactorSource`]; the calculation itself
//! is [`calculate_row`].

use nzi_types::{EmissionFactor, FactorMethod, Scope, ScopeConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::calculation::{calculate_row, clean_text, RowCalculation, RowInput};
use crate::error::{CalcError, NziError, NziResult};
use crate::sources::{FactorQuery, FactorSource};

/// Entry as submitted from the data-entry form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    #[serde(default)]
    pub method: Option<FactorMethod>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub factor_id: Option<i64>,
    #[serde(default)]
    pub override_tco2e: Option<f64>,
    #[serde(default)]
    pub override_reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated entry with its calculation, ready to insert or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedEntry {
    pub job_id: i64,
    pub scope: Scope,
    pub method: FactorMethod,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub amount: f64,
    pub unit: Option<String>,
    pub dataset_id: Option<i64>,
    pub factor_id: Option<i64>,
    pub factor_value: Option<f64>,
    pub notes: Option<String>,
    pub calculation: RowCalculation,
}

#[derive(Clone)]
pub struct ScopeEntryService {
    factors: Arc<dyn FactorSource>,
}

impl ScopeEntryService {
    pub fn new(factors: Arc<dyn FactorSource>) -> Self {
        Self { factors }
    }

    async fn resolve_factor(&self, factor_id: i64) -> NziResult<EmissionFactor> {
        self.factors
            .factor(factor_id)
            .await?
            .ok_or_else(|| CalcError::FactorNotFound { factor_id }.into())
    }

    /// Factors offered for a scope, restricted to the job's dataset
    pub async fn search_factors(
        &self,
        config: &ScopeConfig,
        scope: Scope,
        text: &str,
    ) -> NziResult<Vec<EmissionFactor>> {
        let query = FactorQuery::new(text)
            .in_dataset(config.dataset_id)
            .in_scope(scope.label());
        self.factors.search_factors(&query).await
    }

    /// Validate and calculate a draft entry.
    ///
    /// Rejects entries for a disabled scope, unknown factors, factors without a
    /// value and overrides without a reason.
    pub async fn prepare(
        &self,
        job_id: i64,
        scope: Scope,
        config: &ScopeConfig,
        draft: &EntryDraft,
    ) -> NziResult<PreparedEntry> {
        if !config.include_scope {
            return Err(NziError::ScopeDisabled { job_id, scope });
        }

        let mut input = RowInput::new(draft.amount);
        input.override_tco2e = draft.override_tco2e;
        input.override_reason = draft.override_reason.clone();

        let factor = match draft.factor_id {
            Some(factor_id) => Some(self.resolve_factor(factor_id).await?),
            None => None,
        };
        if let Some(factor) = &factor {
            input = input.with_factor_record(factor)?;
        }

        let calculation = calculate_row(&input)?;
        debug!(job_id, %scope, used = ?calculation.used_tco2e, "prepared scope entry");

        Ok(PreparedEntry {
            job_id,
            scope,
            method: draft.method.unwrap_or(config.factor_method),
            category: clean_text(draft.category.as_deref()),
            subcategory: clean_text(draft.subcategory.as_deref()),
            description: clean_text(draft.description.as_deref()),
            amount: draft.amount,
            unit: clean_text(draft.unit.as_deref()),
            dataset_id: config
                .dataset_id
                .or_else(|| factor.as_ref().and_then(|f| f.dataset_id)),
            factor_id: factor.as_ref().map(|f| f.factor_id),
            factor_value: input.factor_value,
            notes: clean_text(draft.notes.as_deref()),
            calculation,
        })
    }
}
