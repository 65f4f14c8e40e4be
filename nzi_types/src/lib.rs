//! NZI Types - Level 1 Foundation Types
//!
//! Pure data structures shared by the calculation core, the forecast engine and
//! the persistence layer.
//!
//! ## Architecture Level: LEVEL 1 (Foundation)
//!
//! This crate sits at the bottom of the dependency hierarchy. It depends on no
//! other workspace crate.
//!
//! ## Contents
//!
//! - GHG Protocol scopes and per-scope value triples
//! - Emission factor records and dataset metadata
//! - Client reduction targets
//! - Scope entries (activity/spend lines) and per-job scope configuration
//! - Forecast rows
//!
//! ## Rules
//!
//! 1. **NO BUSINESS LOGIC** - unit conversion and forecasting live in `nzi_pro`
//! 2. **CONSTRUCTORS AND ACCESSORS ONLY**
//! 3. **SERIALIZABLE** - all types support serde

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SCOPES
// ============================================================================

/// GHG Protocol emission scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Direct emissions from owned or controlled sources
    #[serde(rename = "Scope 1")]
    Scope1,
    /// Indirect emissions from purchased energy
    #[serde(rename = "Scope 2")]
    Scope2,
    /// Other indirect emissions across the value chain
    #[serde(rename = "Scope 3")]
    Scope3,
}

impl Scope {
    /// All scopes in reporting order
    pub const ALL: [Scope; 3] = [Scope::Scope1, Scope::Scope2, Scope::Scope3];

    /// Canonical label as stored in the database and shown in tables
    pub fn label(&self) -> &'static str {
        match self {
            Scope::Scope1 => "Scope 1",
            Scope::Scope2 => "Scope 2",
            Scope::Scope3 => "Scope 3",
        }
    }

    /// Match a free-form scope label by case-insensitive prefix.
    ///
    /// `"scope 1 - fleet"` and `" SCOPE 1"` both resolve to [`Scope::Scope1`].
    pub fn from_label(label: &str) -> Option<Scope> {
        let normalized = label.trim().to_lowercase();
        Scope::ALL
            .into_iter()
            .find(|scope| normalized.starts_with(&scope.label().to_lowercase()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string does not name a scope
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown scope label: '{0}'")]
pub struct ParseScopeError(pub String);

impl FromStr for Scope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::from_label(s).ok_or_else(|| ParseScopeError(s.to_string()))
    }
}

/// One value per scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeValues<T> {
    pub scope_1: T,
    pub scope_2: T,
    pub scope_3: T,
}

impl<T: Copy> ScopeValues<T> {
    /// Create from explicit per-scope values
    pub fn new(scope_1: T, scope_2: T, scope_3: T) -> Self {
        Self {
            scope_1,
            scope_2,
            scope_3,
        }
    }

    /// Same value for every scope
    pub fn uniform(value: T) -> Self {
        Self::new(value, value, value)
    }

    /// Value for a scope
    pub fn get(&self, scope: Scope) -> T {
        match scope {
            Scope::Scope1 => self.scope_1,
            Scope::Scope2 => self.scope_2,
            Scope::Scope3 => self.scope_3,
        }
    }

    /// Mutable slot for a scope
    pub fn get_mut(&mut self, scope: Scope) -> &mut T {
        match scope {
            Scope::Scope1 => &mut self.scope_1,
            Scope::Scope2 => &mut self.scope_2,
            Scope::Scope3 => &mut self.scope_3,
        }
    }

    /// Apply a function to each scope's value
    pub fn map<U: Copy>(&self, mut f: impl FnMut(Scope, T) -> U) -> ScopeValues<U> {
        ScopeValues::new(
            f(Scope::Scope1, self.scope_1),
            f(Scope::Scope2, self.scope_2),
            f(Scope::Scope3, self.scope_3),
        )
    }
}

// ============================================================================
// EMISSION FACTORS
// ============================================================================

/// Method used to quantify a scope entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorMethod {
    /// Physical activity data (kWh, litres, miles)
    #[default]
    Activity,
    /// Spend-based data (currency)
    Spend,
    /// Manually supplied emissions
    Custom,
}

impl FactorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorMethod::Activity => "Activity",
            FactorMethod::Spend => "Spend",
            FactorMethod::Custom => "Custom",
        }
    }

    /// Parse a stored method name; unknown or blank values fall back to `Activity`
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("spend") => FactorMethod::Spend,
            Some("custom") => FactorMethod::Custom,
            _ => FactorMethod::Activity,
        }
    }
}

impl fmt::Display for FactorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emission factor record from a versioned dataset.
///
/// Created during dataset ingestion and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactor {
    /// Registry primary key
    pub factor_id: i64,
    /// Owning dataset
    pub dataset_id: Option<i64>,
    /// Conversion factor; `None` when the source row carried no value
    pub value: Option<f64>,
    /// GHG unit tag such as `kgCO2e` or `tCO2e`
    pub ghg_unit: Option<String>,
    /// Physical unit the factor applies to (informational)
    pub uom: Option<String>,
    /// Scope label from the source dataset
    pub scope: Option<String>,
    pub level_1: Option<String>,
    pub level_2: Option<String>,
    pub level_3: Option<String>,
    /// Free-text description from the source dataset
    pub column_text: Option<String>,
}

impl EmissionFactor {
    /// Create a factor with a value and GHG unit and no descriptive fields
    pub fn new(factor_id: i64, value: f64, ghg_unit: impl Into<String>) -> Self {
        Self {
            factor_id,
            dataset_id: None,
            value: Some(value),
            ghg_unit: Some(ghg_unit.into()),
            uom: None,
            scope: None,
            level_1: None,
            level_2: None,
            level_3: None,
            column_text: None,
        }
    }

    pub fn with_uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = Some(uom.into());
        self
    }

    pub fn with_dataset(mut self, dataset_id: i64) -> Self {
        self.dataset_id = Some(dataset_id);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.column_text = Some(text.into());
        self
    }

    /// Search-result label: `[id] text | level 1 | level 2 | unit=.. | factor=..`
    pub fn label(&self) -> String {
        let mut parts: Vec<String> = [
            &self.column_text,
            &self.level_1,
            &self.level_2,
            &self.level_3,
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect();

        if let Some(uom) = self.uom.as_deref().filter(|u| !u.trim().is_empty()) {
            parts.push(format!("unit={}", uom));
        }
        if let Some(value) = self.value {
            parts.push(format!("factor={}", value));
        }

        if parts.is_empty() {
            format!("[{}] factor", self.factor_id)
        } else {
            format!("[{}] {}", self.factor_id, parts.join(" | "))
        }
    }
}

/// Dataset metadata stamped onto every ingested factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub dataset_id: i64,
    pub name: String,
    pub source: String,
    pub region: Option<String>,
    pub currency: Option<String>,
    pub year: i32,
    pub version: Option<String>,
}

// ============================================================================
// CLIENT TARGETS
// ============================================================================

/// Net-zero and interim reduction targets held on a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientTargets {
    pub client_id: i64,
    /// Year by which emissions reach zero
    pub net_zero_year: i32,
    /// Milestone year for the interim reduction
    pub interim_year: i32,
    /// Percentage reduction (0-100) achieved by the interim year, per scope
    pub interim_pct: ScopeValues<u8>,
    /// Explicitly configured baseline year, if any
    pub baseline_year: Option<i32>,
}

impl ClientTargets {
    pub const DEFAULT_NET_ZERO_YEAR: i32 = 2050;
    pub const DEFAULT_INTERIM_YEAR: i32 = 2035;
    pub const DEFAULT_INTERIM_PCT: u8 = 50;

    /// Targets with the portal defaults for a new client
    pub fn with_defaults(client_id: i64) -> Self {
        Self {
            client_id,
            net_zero_year: Self::DEFAULT_NET_ZERO_YEAR,
            interim_year: Self::DEFAULT_INTERIM_YEAR,
            interim_pct: ScopeValues::uniform(Self::DEFAULT_INTERIM_PCT),
            baseline_year: None,
        }
    }
}

// ============================================================================
// SCOPE ENTRIES
// ============================================================================

/// Per-job configuration for one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub include_scope: bool,
    pub dataset_id: Option<i64>,
    pub factor_method: FactorMethod,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            include_scope: true,
            dataset_id: None,
            factor_method: FactorMethod::Activity,
        }
    }
}

/// One activity or spend line recorded against a job's scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub entry_id: i64,
    pub job_id: i64,
    pub scope: Scope,
    pub method: FactorMethod,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    /// Activity or spend quantity
    pub amount: f64,
    pub unit: Option<String>,
    pub dataset_id: Option<i64>,
    pub factor_id: Option<i64>,
    pub factor_value: Option<f64>,
    /// Quantity x factor, normalized to tonnes
    pub calculated_tco2e: Option<f64>,
    pub override_tco2e: Option<f64>,
    pub override_reason: Option<String>,
    pub notes: Option<String>,
    /// Soft-delete flag
    pub is_archived: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScopeEntry {
    /// Value used for reporting: a positive override, otherwise the calculated value
    pub fn used_tco2e(&self) -> Option<f64> {
        self.override_tco2e
            .filter(|v| *v > 0.0)
            .or(self.calculated_tco2e)
    }
}

// ============================================================================
// FORECAST
// ============================================================================

/// Projected emissions for one year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Scope 1")]
    pub scope_1: f64,
    #[serde(rename = "Scope 2")]
    pub scope_2: f64,
    #[serde(rename = "Scope 3")]
    pub scope_3: f64,
    /// Sum of the three scopes, never rounded independently
    #[serde(rename = "Total")]
    pub total: f64,
}

impl ForecastRow {
    /// Build a row from per-scope values; the total is derived
    pub fn new(year: i32, values: ScopeValues<f64>) -> Self {
        Self {
            year,
            scope_1: values.scope_1,
            scope_2: values.scope_2,
            scope_3: values.scope_3,
            total: values.scope_1 + values.scope_2 + values.scope_3,
        }
    }

    pub fn scope(&self, scope: Scope) -> f64 {
        match scope {
            Scope::Scope1 => self.scope_1,
            Scope::Scope2 => self.scope_2,
            Scope::Scope3 => self.scope_3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_label_prefix() {
        assert_eq!(Scope::from_label("Scope 1"), Some(Scope::Scope1));
        assert_eq!(Scope::from_label("  scope 2 - electricity"), Some(Scope::Scope2));
        assert_eq!(Scope::from_label("SCOPE 3"), Some(Scope::Scope3));
        assert_eq!(Scope::from_label("Scope"), None);
        assert_eq!(Scope::from_label("Other"), None);
    }

    #[test]
    fn test_scope_from_str_error() {
        let err = "Scope 4".parse::<Scope>().unwrap_err();
        assert!(err.to_string().contains("Scope 4"));
    }

    #[test]
    fn test_scope_values_access() {
        let mut values = ScopeValues::new(1.0, 2.0, 3.0);
        assert_eq!(values.get(Scope::Scope2), 2.0);
        *values.get_mut(Scope::Scope3) += 1.0;
        assert_eq!(values.scope_3, 4.0);

        let doubled = values.map(|_, v| v * 2.0);
        assert_eq!(doubled, ScopeValues::new(2.0, 4.0, 8.0));
    }

    #[test]
    fn test_factor_method_lenient_parse() {
        assert_eq!(FactorMethod::parse_lenient(Some("Spend")), FactorMethod::Spend);
        assert_eq!(FactorMethod::parse_lenient(Some(" custom ")), FactorMethod::Custom);
        assert_eq!(FactorMethod::parse_lenient(Some("unknown")), FactorMethod::Activity);
        assert_eq!(FactorMethod::parse_lenient(None), FactorMethod::Activity);
    }

    #[test]
    fn test_factor_label() {
        let factor = EmissionFactor::new(7, 0.2, "kgCO2e")
            .with_text("Electricity")
            .with_uom("kWh");
        assert_eq!(factor.label(), "[7] Electricity | unit=kWh | factor=0.2");

        let bare = EmissionFactor {
            value: None,
            ..EmissionFactor::new(8, 0.0, "kgCO2e")
        };
        assert_eq!(bare.label(), "[8] factor");
    }

    #[test]
    fn test_client_target_defaults() {
        let targets = ClientTargets::with_defaults(3);
        assert_eq!(targets.net_zero_year, 2050);
        assert_eq!(targets.interim_year, 2035);
        assert_eq!(targets.interim_pct, ScopeValues::uniform(50));
        assert!(targets.baseline_year.is_none());
    }

    #[test]
    fn test_used_value_prefers_override() {
        let mut entry = ScopeEntry {
            entry_id: 1,
            job_id: 1,
            scope: Scope::Scope1,
            method: FactorMethod::Activity,
            category: None,
            subcategory: None,
            description: None,
            amount: 10.0,
            unit: None,
            dataset_id: None,
            factor_id: None,
            factor_value: Some(2.0),
            calculated_tco2e: Some(0.02),
            override_tco2e: None,
            override_reason: None,
            notes: None,
            is_archived: false,
            updated_at: None,
        };
        assert_eq!(entry.used_tco2e(), Some(0.02));

        entry.override_tco2e = Some(5.0);
        entry.override_reason = Some("Supplier invoice".to_string());
        assert_eq!(entry.used_tco2e(), Some(5.0));

        // Non-positive overrides never take effect
        entry.override_reason = None;
        entry.override_tco2e = Some(0.0);
        assert_eq!(entry.used_tco2e(), Some(0.02));
        entry.override_tco2e = Some(-3.0);
        assert_eq!(entry.used_tco2e(), Some(0.02));
    }

    #[test]
    fn test_forecast_row_serialization_columns() {
        let row = ForecastRow::new(2030, ScopeValues::new(1.0, 2.0, 3.5));
        assert_eq!(row.total, 6.5);

        let json = serde_json::to_value(row).unwrap();
        assert_eq!(json["Year"], 2030);
        assert_eq!(json["Scope 3"], 3.5);
        assert_eq!(json["Total"], 6.5);
    }
}
