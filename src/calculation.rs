//! Row calculation
//!
//! Converts one scope entry's quantity and selected emission factor into tonnes
//! of CO2e and applies the manual override policy. Everything here is a pure
//! function of its inputs.

use nzi_types::EmissionFactor;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CalcError, CalcResult};
use crate::units;

/// Inputs for one row calculation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowInput {
    /// Activity or spend quantity
    pub quantity: f64,
    /// Selected factor value; `None` for purely manual rows
    #[serde(default)]
    pub factor_value: Option<f64>,
    #[serde(default)]
    pub ghg_unit: Option<String>,
    #[serde(default)]
    pub override_tco2e: Option<f64>,
    #[serde(default)]
    pub override_reason: Option<String>,
}

impl RowInput {
    pub fn new(quantity: f64) -> Self {
        Self {
            quantity,
            ..Self::default()
        }
    }

    pub fn with_factor(mut self, value: f64, ghg_unit: Option<&str>) -> Self {
        self.factor_value = Some(value);
        self.ghg_unit = ghg_unit.map(str::to_string);
        self
    }

    /// Attach a registry factor; a selected factor must carry a value
    pub fn with_factor_record(mut self, factor: &EmissionFactor) -> CalcResult<Self> {
        let value = factor.value.ok_or(CalcError::MissingFactorValue {
            factor_id: factor.factor_id,
        })?;
        self.factor_value = Some(value);
        self.ghg_unit = factor.ghg_unit.clone();
        Ok(self)
    }

    pub fn with_override(mut self, value: f64, reason: impl Into<String>) -> Self {
        self.override_tco2e = Some(value);
        self.override_reason = Some(reason.into());
        self
    }
}

/// Outcome of a row calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCalculation {
    /// `quantity x factor`, normalized to tonnes; `None` without a factor
    pub calculated_tco2e: Option<f64>,
    pub override_tco2e: Option<f64>,
    /// Trimmed override reason, present exactly when `override_tco2e` is
    pub override_reason: Option<String>,
    /// Value used in all downstream aggregation
    pub used_tco2e: Option<f64>,
    pub is_override: bool,
}

/// Tonnes CO2e for `quantity x factor_value` in the given GHG unit
pub fn calculate_tco2e(quantity: f64, factor_value: f64, ghg_unit: Option<&str>) -> f64 {
    units::tonnes_co2e(quantity, factor_value, ghg_unit)
}

/// An override only counts when it is strictly positive
pub fn effective_override(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

/// Check the override-requires-reason rule and return the trimmed reason
pub fn validate_override(
    override_tco2e: Option<f64>,
    override_reason: Option<&str>,
) -> CalcResult<Option<String>> {
    match effective_override(override_tco2e) {
        None => Ok(None),
        Some(value) => clean_text(override_reason)
            .map(Some)
            .ok_or(CalcError::OverrideWithoutReason { value }),
    }
}

/// Parse a factor value held as text (CSV cells, form input)
pub fn parse_factor_value(raw: Option<&str>, factor_id: i64) -> CalcResult<f64> {
    let text = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(CalcError::MissingFactorValue { factor_id })?;

    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CalcError::NonNumericFactor {
            raw: text.to_string(),
        })
}

/// Calculate one row and apply the override policy
pub fn calculate_row(input: &RowInput) -> CalcResult<RowCalculation> {
    let override_reason =
        validate_override(input.override_tco2e, input.override_reason.as_deref())?;
    let override_tco2e = effective_override(input.override_tco2e);

    let calculated_tco2e = match input.factor_value {
        Some(value) if !value.is_finite() => {
            return Err(CalcError::NonNumericFactor {
                raw: value.to_string(),
            })
        }
        Some(value) => Some(calculate_tco2e(
            input.quantity,
            value,
            input.ghg_unit.as_deref(),
        )),
        None => None,
    };

    debug!(
        quantity = input.quantity,
        ?calculated_tco2e,
        ?override_tco2e,
        "calculated scope row"
    );

    Ok(RowCalculation {
        calculated_tco2e,
        override_tco2e,
        override_reason,
        used_tco2e: override_tco2e.or(calculated_tco2e),
        is_override: override_tco2e.is_some(),
    })
}

/// Trim free text; blank becomes `None`
pub fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
