//! GHG unit normalization
//!
//! Emission factors arrive tagged with a GHG unit string. Everything downstream
//! reports in tonnes, so the raw `quantity x factor` product is either divided by
//! 1000 (kilogram factors) or taken as-is (tonne factors).

use serde::{Deserialize, Serialize};

/// Unit assumed when a factor carries no GHG unit
pub const DEFAULT_GHG_UNIT: &str = "kgCO2e";

const KG_PER_TONNE: f64 = 1000.0;

/// Mass unit of a factor's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GhgUnit {
    Kilograms,
    Tonnes,
}

impl GhgUnit {
    /// Classify a raw GHG unit tag.
    ///
    /// Blank or missing tags mean [`DEFAULT_GHG_UNIT`]. Tags starting with `kg`
    /// are kilograms; tags starting with `t` or containing `tonne` are tonnes.
    /// Anything else is read as kilograms, the unit of the dominant factor source.
    pub fn normalize(raw: Option<&str>) -> Self {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        let tag = if trimmed.is_empty() {
            DEFAULT_GHG_UNIT.to_lowercase()
        } else {
            trimmed.to_lowercase()
        };

        if tag.starts_with("kg") {
            GhgUnit::Kilograms
        } else if tag.starts_with('t') || tag.contains("tonne") {
            GhgUnit::Tonnes
        } else {
            GhgUnit::Kilograms
        }
    }

    /// Convert a raw product in this unit to tonnes
    pub fn to_tonnes(self, raw_product: f64) -> f64 {
        match self {
            GhgUnit::Kilograms => raw_product / KG_PER_TONNE,
            GhgUnit::Tonnes => raw_product,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GhgUnit::Kilograms => "kgCO2e",
            GhgUnit::Tonnes => "tCO2e",
        }
    }
}

/// `quantity x factor_value`, normalized to tonnes CO2e
pub fn tonnes_co2e(quantity: f64, factor_value: f64, ghg_unit: Option<&str>) -> f64 {
    GhgUnit::normalize(ghg_unit).to_tonnes(quantity * factor_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kilogram_tags() {
        assert_eq!(GhgUnit::normalize(Some("kgCO2e")), GhgUnit::Kilograms);
        assert_eq!(GhgUnit::normalize(Some("  KGCO2E ")), GhgUnit::Kilograms);
        assert_eq!(GhgUnit::normalize(Some("kg CO2e per kWh")), GhgUnit::Kilograms);
    }

    #[test]
    fn test_tonne_tags() {
        assert_eq!(GhgUnit::normalize(Some("tCO2e")), GhgUnit::Tonnes);
        assert_eq!(GhgUnit::normalize(Some("Tonnes CO2e")), GhgUnit::Tonnes);
        assert_eq!(GhgUnit::normalize(Some("metric tonne")), GhgUnit::Tonnes);
    }

    #[test]
    fn test_blank_and_unknown_fall_back_to_kilograms() {
        assert_eq!(GhgUnit::normalize(None), GhgUnit::Kilograms);
        assert_eq!(GhgUnit::normalize(Some("   ")), GhgUnit::Kilograms);
        assert_eq!(GhgUnit::normalize(Some("gCO2e")), GhgUnit::Kilograms);
        assert_eq!(GhgUnit::normalize(Some("lbs")), GhgUnit::Kilograms);
    }

    #[test]
    fn test_tonnes_co2e() {
        assert!((tonnes_co2e(10.0, 2.0, Some("kgCO2e")) - 0.02).abs() < 1e-12);
        assert_eq!(tonnes_co2e(10.0, 2.0, Some("tCO2e")), 20.0);
        assert!((tonnes_co2e(10.0, 2.0, None) - 0.02).abs() < 1e-12);
        assert_eq!(tonnes_co2e(0.0, 2.0, Some("tCO2e")), 0.0);
    }
}
