//! Baseline aggregates and baseline-year resolution
//!
//! The forecast engine is anchored on a baseline: actual emissions per scope for
//! one reporting year. Aggregation itself happens in the store; this module turns
//! the store's `(scope label, total)` rows into a [`Baseline`] and decides which
//! year to anchor on.

use nzi_types::{Scope, ScopeValues};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Actual emissions per scope for the baseline year, in tCO2e
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub emissions: ScopeValues<f64>,
}

impl Baseline {
    pub fn new(scope_1: f64, scope_2: f64, scope_3: f64) -> Self {
        Self {
            emissions: ScopeValues::new(scope_1, scope_2, scope_3),
        }
    }

    /// Build from aggregated `(scope label, total)` rows.
    ///
    /// Labels match by case-insensitive prefix (`"scope 2 - market"` counts as
    /// Scope 2). Unrecognized labels are skipped, `None` totals count as zero and
    /// repeated scopes accumulate.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<f64>)>,
    {
        let mut baseline = Baseline::default();
        for (label, total) in rows {
            match Scope::from_label(label) {
                Some(scope) => *baseline.emissions.get_mut(scope) += total.unwrap_or(0.0),
                None => debug!(label, "skipping unrecognized scope label in baseline"),
            }
        }
        baseline
    }

    /// Build from a `scope name -> emissions` map; absent scopes are zero
    pub fn from_map(map: &HashMap<String, f64>) -> Self {
        Self::from_rows(map.iter().map(|(k, v)| (k.as_str(), Some(*v))))
    }

    pub fn get(&self, scope: Scope) -> f64 {
        self.emissions.get(scope)
    }

    pub fn total(&self) -> f64 {
        self.emissions.scope_1 + self.emissions.scope_2 + self.emissions.scope_3
    }
}

impl From<ScopeValues<f64>> for Baseline {
    fn from(emissions: ScopeValues<f64>) -> Self {
        Self { emissions }
    }
}

/// Where the resolved baseline year came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineYearSource {
    /// Explicitly configured on the client
    Configured,
    /// Earliest CRP reporting year on record
    EarliestReport,
    /// No history; the current working year
    WorkingYear,
}

/// Resolved baseline year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineYear {
    pub year: i32,
    pub source: BaselineYearSource,
}

/// Configured year, else the earliest reporting year, else the working year
pub fn resolve_baseline_year(
    configured: Option<i32>,
    earliest_reporting_year: Option<i32>,
    working_year: i32,
) -> BaselineYear {
    match (configured, earliest_reporting_year) {
        (Some(year), _) => BaselineYear {
            year,
            source: BaselineYearSource::Configured,
        },
        (None, Some(year)) => BaselineYear {
            year,
            source: BaselineYearSource::EarliestReport,
        },
        (None, None) => BaselineYear {
            year: working_year,
            source: BaselineYearSource::WorkingYear,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_prefix_matching() {
        let baseline = Baseline::from_rows([
            ("Scope 1", Some(100.0)),
            ("scope 2 - location based", Some(40.0)),
            ("  SCOPE 3 ", Some(7.5)),
            ("Out of scope", Some(999.0)),
        ]);
        assert_eq!(baseline, Baseline::new(100.0, 40.0, 7.5));
        assert_eq!(baseline.total(), 147.5);
    }

    #[test]
    fn test_from_rows_defaults_and_accumulation() {
        let baseline = Baseline::from_rows([
            ("Scope 1", Some(10.0)),
            ("Scope 1 fleet", Some(5.0)),
            ("Scope 3", None),
        ]);
        assert_eq!(baseline.get(Scope::Scope1), 15.0);
        assert_eq!(baseline.get(Scope::Scope2), 0.0);
        assert_eq!(baseline.get(Scope::Scope3), 0.0);
    }

    #[test]
    fn test_from_map() {
        let mut map = HashMap::new();
        map.insert("Scope 2".to_string(), 12.0);
        let baseline = Baseline::from_map(&map);
        assert_eq!(baseline, Baseline::new(0.0, 12.0, 0.0));
    }

    #[test]
    fn test_resolve_baseline_year_precedence() {
        assert_eq!(
            resolve_baseline_year(Some(2019), Some(2021), 2026),
            BaselineYear {
                year: 2019,
                source: BaselineYearSource::Configured
            }
        );
        assert_eq!(
            resolve_baseline_year(None, Some(2021), 2026).source,
            BaselineYearSource::EarliestReport
        );
        assert_eq!(resolve_baseline_year(None, None, 2026).year, 2026);
    }
}
