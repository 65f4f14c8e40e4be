//! Target forecast engine
//!
//! Projects per-scope emissions from a baseline year to the net-zero year along
//! two straight lines: baseline down to the interim target, then interim target
//! down to zero. Whenever the interim year precedes the net-zero year the curve
//! ends at exactly zero.
//!
//! ```rust
//! use nzi_pro::baseline::Baseline;
//! use nzi_pro::forecast::{build_forecast, ForecastParams};
//! use nzi_types::ScopeValues;
//!
//! let params = ForecastParams::new(2024, 2050, 2035, ScopeValues::uniform(50));
//! let table = build_forecast(&params, &Baseline::new(100.0, 0.0, 0.0));
//! assert_eq!(table.at(2035).map(|r| r.scope_1), Some(50.0));
//! assert_eq!(table.at(2050).map(|r| r.scope_1), Some(0.0));
//! ```

use nzi_types::{ClientTargets, ForecastRow, Scope, ScopeValues};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use tracing::debug;

use crate::baseline::Baseline;

/// Column headers of the rendered forecast table
pub const FORECAST_COLUMNS: [&str; 5] = ["Year", "Scope 1", "Scope 2", "Scope 3", "Total"];

/// Longest year span callers outside the crate may request
pub const MAX_FORECAST_YEARS: usize = 500;

/// Inputs to the forecast engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastParams {
    pub baseline_year: i32,
    pub net_zero_year: i32,
    pub interim_year: i32,
    /// Reduction (0-100) reached by the interim year, per scope
    pub interim_pct: ScopeValues<u8>,
}

impl ForecastParams {
    pub fn new(
        baseline_year: i32,
        net_zero_year: i32,
        interim_year: i32,
        interim_pct: ScopeValues<u8>,
    ) -> Self {
        Self {
            baseline_year,
            net_zero_year,
            interim_year,
            interim_pct,
        }
    }

    /// Parameters from a client's stored targets and a resolved baseline year
    pub fn from_targets(targets: &ClientTargets, baseline_year: i32) -> Self {
        Self::new(
            baseline_year,
            targets.net_zero_year,
            targets.interim_year,
            targets.interim_pct,
        )
    }

    /// Number of rows the forecast will contain
    pub fn year_count(&self) -> usize {
        let span = i64::from(self.net_zero_year) - i64::from(self.baseline_year) + 1;
        usize::try_from(span).unwrap_or(0)
    }

    /// Flag inputs outside `baseline <= interim <= net_zero` or `pct <= 100`.
    ///
    /// The engine computes the same curve regardless; callers decide what to do
    /// with the warnings.
    pub fn check_range(&self) -> Vec<RangeWarning> {
        let mut warnings = Vec::new();
        if self.net_zero_year < self.baseline_year {
            warnings.push(RangeWarning::NetZeroBeforeBaseline {
                baseline_year: self.baseline_year,
                net_zero_year: self.net_zero_year,
            });
        }
        if self.interim_year < self.baseline_year {
            warnings.push(RangeWarning::InterimBeforeBaseline {
                baseline_year: self.baseline_year,
                interim_year: self.interim_year,
            });
        }
        if self.interim_year > self.net_zero_year {
            warnings.push(RangeWarning::InterimAfterNetZero {
                interim_year: self.interim_year,
                net_zero_year: self.net_zero_year,
            });
        }
        for scope in Scope::ALL {
            let pct = self.interim_pct.get(scope);
            if pct > 100 {
                warnings.push(RangeWarning::PercentAboveHundred { scope, pct });
            }
        }
        warnings
    }
}

/// Out-of-range forecast input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeWarning {
    NetZeroBeforeBaseline {
        baseline_year: i32,
        net_zero_year: i32,
    },
    InterimBeforeBaseline {
        baseline_year: i32,
        interim_year: i32,
    },
    InterimAfterNetZero {
        interim_year: i32,
        net_zero_year: i32,
    },
    PercentAboveHundred {
        scope: Scope,
        pct: u8,
    },
}

impl fmt::Display for RangeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeWarning::NetZeroBeforeBaseline {
                baseline_year,
                net_zero_year,
            } => write!(
                f,
                "net-zero year {} is before baseline year {}; forecast is empty",
                net_zero_year, baseline_year
            ),
            RangeWarning::InterimBeforeBaseline {
                baseline_year,
                interim_year,
            } => write!(
                f,
                "interim year {} is before baseline year {}",
                interim_year, baseline_year
            ),
            RangeWarning::InterimAfterNetZero {
                interim_year,
                net_zero_year,
            } => write!(
                f,
                "interim year {} is after net-zero year {}",
                interim_year, net_zero_year
            ),
            RangeWarning::PercentAboveHundred { scope, pct } => {
                write!(f, "{} interim reduction {}% exceeds 100%", scope, pct)
            }
        }
    }
}

/// Fraction of the way from `start` to `end` at `year`, clamped to `[0, 1]`.
/// A zero-length segment has fraction zero.
fn segment_fraction(year: i32, start: i32, end: i32) -> f64 {
    if end == start {
        return 0.0;
    }
    let frac = (f64::from(year) - f64::from(start)) / (f64::from(end) - f64::from(start));
    frac.clamp(0.0, 1.0)
}

/// Projected emissions for one scope in one year
pub fn project_scope(params: &ForecastParams, baseline_emissions: f64, pct: u8, year: i32) -> f64 {
    if baseline_emissions <= 0.0 {
        return 0.0;
    }

    let reduction = f64::from(pct) / 100.0;
    if year <= params.interim_year {
        let frac = segment_fraction(year, params.baseline_year, params.interim_year);
        baseline_emissions * (1.0 - reduction * frac)
    } else {
        let interim_emissions = baseline_emissions * (1.0 - reduction);
        let frac = segment_fraction(year, params.interim_year, params.net_zero_year);
        (interim_emissions * (1.0 - frac)).max(0.0)
    }
}

/// Build the full year-by-year forecast
pub fn build_forecast(params: &ForecastParams, baseline: &Baseline) -> ForecastTable {
    let rows: Vec<ForecastRow> = (params.baseline_year..=params.net_zero_year)
        .map(|year| {
            let values = baseline
                .emissions
                .map(|scope, e0| project_scope(params, e0, params.interim_pct.get(scope), year));
            ForecastRow::new(year, values)
        })
        .collect();

    debug!(
        baseline_year = params.baseline_year,
        net_zero_year = params.net_zero_year,
        interim_year = params.interim_year,
        rows = rows.len(),
        "built forecast"
    );

    ForecastTable { rows }
}

/// Ordered forecast output: one row per year, baseline to net-zero inclusive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForecastTable {
    rows: Vec<ForecastRow>,
}

impl ForecastTable {
    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ForecastRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for a given year
    pub fn at(&self, year: i32) -> Option<&ForecastRow> {
        let first = self.rows.first()?.year;
        let idx = usize::try_from(i64::from(year) - i64::from(first)).ok()?;
        self.rows.get(idx).filter(|row| row.year == year)
    }

    /// Values for one scope, in year order
    pub fn series(&self, scope: Scope) -> Vec<(i32, f64)> {
        self.rows.iter().map(|r| (r.year, r.scope(scope))).collect()
    }

    /// Write as CSV with header `Year,Scope 1,Scope 2,Scope 3,Total`
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        if self.rows.is_empty() {
            wtr.write_record(FORECAST_COLUMNS)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, csv::Error> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl fmt::Display for ForecastTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>6} {:>14} {:>14} {:>14} {:>14}",
            FORECAST_COLUMNS[0],
            FORECAST_COLUMNS[1],
            FORECAST_COLUMNS[2],
            FORECAST_COLUMNS[3],
            FORECAST_COLUMNS[4]
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:>6} {:>14.3} {:>14.3} {:>14.3} {:>14.3}",
                row.year, row.scope_1, row.scope_2, row.scope_3, row.total
            )?;
        }
        Ok(())
    }
}
