//! Data-source seams
//!
//! The core never owns client or factor records. Services reach them through
//! these traits; the Postgres repositories implement them under the `database`
//! feature and the in-memory versions back tests and offline tooling.

use async_trait::async_trait;
use nzi_types::{ClientTargets, EmissionFactor};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::baseline::Baseline;
use crate::error::NziResult;

/// Maximum number of factors returned by a search
pub const FACTOR_SEARCH_LIMIT: i64 = 200;

/// Client targets and historical aggregates
#[async_trait]
pub trait ClientSource: Send + Sync {
    /// Stored reduction targets, `None` for an unknown client
    async fn client_targets(&self, client_id: i64) -> NziResult<Option<ClientTargets>>;

    /// Earliest CRP reporting year on record
    async fn earliest_reporting_year(&self, client_id: i64) -> NziResult<Option<i32>>;

    /// Used tCO2e per scope for the CRP reports of one reporting year
    async fn baseline_emissions(&self, client_id: i64, reporting_year: i32) -> NziResult<Baseline>;
}

/// Factor search criteria
#[derive(Debug, Clone, PartialEq)]
pub struct FactorQuery {
    pub dataset_id: Option<i64>,
    pub scope: Option<String>,
    /// Free text matched against description and level columns
    pub text: String,
    pub limit: i64,
}

impl FactorQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            dataset_id: None,
            scope: None,
            text: text.into(),
            limit: FACTOR_SEARCH_LIMIT,
        }
    }

    pub fn in_dataset(mut self, dataset_id: Option<i64>) -> Self {
        self.dataset_id = dataset_id;
        self
    }

    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Trimmed search text, `None` when blank
    pub fn search_text(&self) -> Option<&str> {
        Some(self.text.trim()).filter(|t| !t.is_empty())
    }
}

/// Emission factor registry
#[async_trait]
pub trait FactorSource: Send + Sync {
    async fn factor(&self, factor_id: i64) -> NziResult<Option<EmissionFactor>>;

    /// Matching factors, newest first. Blank search text returns nothing.
    async fn search_factors(&self, query: &FactorQuery) -> NziResult<Vec<EmissionFactor>>;
}

// ============================================================================
// IN-MEMORY SOURCES
// ============================================================================

/// Map-backed [`ClientSource`]
#[derive(Debug, Default)]
pub struct InMemoryClientSource {
    targets: RwLock<HashMap<i64, ClientTargets>>,
    reporting_years: RwLock<HashMap<i64, Vec<i32>>>,
    baselines: RwLock<HashMap<(i64, i32), Baseline>>,
}

impl InMemoryClientSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(self, targets: ClientTargets) -> Self {
        self.insert_client(targets);
        self
    }

    /// Record a CRP report year with its aggregated emissions
    pub fn with_report(self, client_id: i64, reporting_year: i32, baseline: Baseline) -> Self {
        self.insert_report(client_id, reporting_year, baseline);
        self
    }

    pub fn insert_client(&self, targets: ClientTargets) {
        self.targets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(targets.client_id, targets);
    }

    pub fn insert_report(&self, client_id: i64, reporting_year: i32, baseline: Baseline) {
        self.reporting_years
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(client_id)
            .or_default()
            .push(reporting_year);
        self.baselines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((client_id, reporting_year), baseline);
    }
}

#[async_trait]
impl ClientSource for InMemoryClientSource {
    async fn client_targets(&self, client_id: i64) -> NziResult<Option<ClientTargets>> {
        let map = self.targets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(&client_id).cloned())
    }

    async fn earliest_reporting_year(&self, client_id: i64) -> NziResult<Option<i32>> {
        let map = self
            .reporting_years
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(&client_id).and_then(|years| years.iter().min().copied()))
    }

    async fn baseline_emissions(&self, client_id: i64, reporting_year: i32) -> NziResult<Baseline> {
        let map = self.baselines.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .get(&(client_id, reporting_year))
            .copied()
            .unwrap_or_default())
    }
}

/// Vec-backed [`FactorSource`]
#[derive(Debug, Default)]
pub struct InMemoryFactorSource {
    factors: Vec<EmissionFactor>,
}

impl InMemoryFactorSource {
    pub fn new(factors: Vec<EmissionFactor>) -> Self {
        Self { factors }
    }

    fn matches(factor: &EmissionFactor, query: &FactorQuery, needle: &str) -> bool {
        if let Some(dataset_id) = query.dataset_id {
            if factor.dataset_id != Some(dataset_id) {
                return false;
            }
        }
        if let Some(scope) = &query.scope {
            if !factor
                .scope
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(scope))
            {
                return false;
            }
        }
        [
            &factor.column_text,
            &factor.level_1,
            &factor.level_2,
            &factor.level_3,
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

#[async_trait]
impl FactorSource for InMemoryFactorSource {
    async fn factor(&self, factor_id: i64) -> NziResult<Option<EmissionFactor>> {
        Ok(self
            .factors
            .iter()
            .find(|f| f.factor_id == factor_id)
            .cloned())
    }

    async fn search_factors(&self, query: &FactorQuery) -> NziResult<Vec<EmissionFactor>> {
        let Some(text) = query.search_text() else {
            return Ok(Vec::new());
        };
        let needle = text.to_lowercase();

        let mut found: Vec<EmissionFactor> = self
            .factors
            .iter()
            .filter(|f| Self::matches(f, query, &needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.factor_id.cmp(&a.factor_id));
        found.truncate(usize::try_from(query.limit).unwrap_or(0));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(id: i64, dataset: i64, scope: &str, text: &str) -> EmissionFactor {
        EmissionFactor {
            scope: Some(scope.to_string()),
            ..EmissionFactor::new(id, 0.2, "kgCO2e")
                .with_dataset(dataset)
                .with_text(text)
        }
    }

    #[tokio::test]
    async fn test_search_filters_and_orders_newest_first() {
        let source = InMemoryFactorSource::new(vec![
            factor(1, 10, "Scope 2", "Grid electricity UK"),
            factor(2, 10, "Scope 1", "Diesel fleet"),
            factor(3, 10, "Scope 2", "Electricity T&D losses"),
            factor(4, 20, "Scope 2", "Electricity EU"),
        ]);

        let query = FactorQuery::new("electricity")
            .in_dataset(Some(10))
            .in_scope("scope 2");
        let found = source.search_factors(&query).await.unwrap();
        let ids: Vec<i64> = found.iter().map(|f| f.factor_id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_blank_search_returns_nothing() {
        let source = InMemoryFactorSource::new(vec![factor(1, 10, "Scope 1", "Gas")]);
        assert!(source
            .search_factors(&FactorQuery::new("   "))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_search_text_is_literal() {
        let source = InMemoryFactorSource::new(vec![
            factor(1, 10, "Scope 3", "Paper 100% recycled"),
            factor(2, 10, "Scope 3", "Paper virgin"),
        ]);
        let found = source.search_factors(&FactorQuery::new("100%")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(source
            .search_factors(&FactorQuery::new("p_per"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_search_limit() {
        let factors = (1..=5).map(|i| factor(i, 1, "Scope 3", "Paper")).collect();
        let source = InMemoryFactorSource::new(factors);
        let mut query = FactorQuery::new("paper");
        query.limit = 2;
        assert_eq!(source.search_factors(&query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_poisoned_lock_still_serves_records() {
        let source = InMemoryClientSource::new()
            .with_client(ClientTargets::with_defaults(1))
            .with_report(1, 2021, Baseline::new(3.0, 0.0, 0.0));

        let poisoned = std::thread::scope(|s| {
            s.spawn(|| {
                let _t = source.targets.write().unwrap();
                let _y = source.reporting_years.write().unwrap();
                let _b = source.baselines.write().unwrap();
                panic!("writer died holding the locks");
            })
            .join()
        });
        assert!(poisoned.is_err());
        assert!(source.targets.is_poisoned());

        assert!(source.client_targets(1).await.unwrap().is_some());
        assert_eq!(source.earliest_reporting_year(1).await.unwrap(), Some(2021));
        assert_eq!(
            source.baseline_emissions(1, 2021).await.unwrap(),
            Baseline::new(3.0, 0.0, 0.0)
        );
        source.insert_report(1, 2019, Baseline::default());
        assert_eq!(source.earliest_reporting_year(1).await.unwrap(), Some(2019));
    }

    #[tokio::test]
    async fn test_in_memory_client_source() {
        let source = InMemoryClientSource::new()
            .with_client(ClientTargets::with_defaults(1))
            .with_report(1, 2022, Baseline::new(5.0, 0.0, 0.0))
            .with_report(1, 2020, Baseline::new(9.0, 0.0, 0.0));

        assert!(source.client_targets(1).await.unwrap().is_some());
        assert!(source.client_targets(2).await.unwrap().is_none());
        assert_eq!(source.earliest_reporting_year(1).await.unwrap(), Some(2020));
        assert_eq!(source.earliest_reporting_year(2).await.unwrap(), None);
        assert_eq!(
            source.baseline_emissions(1, 2020).await.unwrap(),
            Baseline::new(9.0, 0.0, 0.0)
        );
        assert_eq!(
            source.baseline_emissions(1, 1999).await.unwrap(),
            Baseline::default()
        );
    }
}
