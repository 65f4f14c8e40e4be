//! Emission factor dataset ingestion
//!
//! Reads factor CSV files published by different bodies (DESNZ conversion
//! factors, spend-based EEIO tables, ...) into one record shape. Column names
//! differ between publishers, so each field is located through a list of header
//! aliases.

use nzi_types::DatasetMeta;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::calculation::clean_text;
use crate::error::{IngestError, IngestResult};
use crate::units::DEFAULT_GHG_UNIT;

const ID_ALIASES: &[&str] = &["ID", "Code"];
const SCOPE_ALIASES: &[&str] = &["Scope"];
const LEVEL_1_ALIASES: &[&str] = &["Level 1", "level_1", "Category", "SIC Section", "Product Group"];
const LEVEL_2_ALIASES: &[&str] = &["Level 2", "level_2", "Subcategory", "SIC Division", "Product"];
const LEVEL_3_ALIASES: &[&str] = &["Level 3", "level_3", "Detail", "Item"];
const TEXT_ALIASES: &[&str] = &[
    "Column Text",
    "column_text",
    "Description",
    "Name",
    "Item Name",
    "Activity",
];
const UOM_ALIASES: &[&str] = &["UOM", "Unit", "Units"];
const FACTOR_ALIASES: &[&str] = &[
    "Factor",
    "GHG Conversion Factor",
    "kgCO2e per unit",
    "kgco2e_per_unit",
    "kgCO2e per GBP",
    "kgCO2e_per_GBP",
];
const GHG_UNIT_ALIASES: &[&str] = &["GHG Unit", "ghg_unit"];

const DEFAULT_CURRENCY: &str = "GBP";

/// Column positions detected from a CSV header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorColumns {
    pub id: Option<usize>,
    pub scope: Option<usize>,
    pub level_1: Option<usize>,
    pub level_2: Option<usize>,
    pub level_3: Option<usize>,
    pub text: usize,
    pub uom: Option<usize>,
    pub factor: usize,
    pub ghg_unit: Option<usize>,
    /// Header of the factor column, used to infer the GHG unit
    pub factor_header: String,
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Position of the first alias present in the headers, in alias order
fn pick(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        let alias = alias.to_lowercase();
        headers.iter().position(|h| *h == alias)
    })
}

impl FactorColumns {
    /// Locate columns; the description text and factor value columns are required
    pub fn detect(headers: &csv::StringRecord) -> IngestResult<Self> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();

        let text = pick(&normalized, TEXT_ALIASES);
        let factor = pick(&normalized, FACTOR_ALIASES);
        let (text, factor) = match (text, factor) {
            (Some(text), Some(factor)) => (text, factor),
            (text, factor) => {
                let mut missing = Vec::new();
                if text.is_none() {
                    missing.push("description text");
                }
                if factor.is_none() {
                    missing.push("factor value");
                }
                return Err(IngestError::MissingColumns {
                    missing: missing.join(", "),
                });
            }
        };

        Ok(Self {
            id: pick(&normalized, ID_ALIASES),
            scope: pick(&normalized, SCOPE_ALIASES),
            level_1: pick(&normalized, LEVEL_1_ALIASES),
            level_2: pick(&normalized, LEVEL_2_ALIASES),
            level_3: pick(&normalized, LEVEL_3_ALIASES),
            text,
            uom: pick(&normalized, UOM_ALIASES),
            factor,
            ghg_unit: pick(&normalized, GHG_UNIT_ALIASES),
            factor_header: normalized[factor].clone(),
        })
    }

    /// GHG unit implied by the factor column header (`kgCO2e per unit` -> kgCO2e)
    fn implied_ghg_unit(&self) -> Option<String> {
        self.factor_header
            .starts_with("kg")
            .then(|| DEFAULT_GHG_UNIT.to_string())
    }
}

/// One factor row ready for the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedFactor {
    pub dataset_id: i64,
    pub file_name: String,
    pub year: i32,
    pub original_id: Option<String>,
    pub scope: Option<String>,
    pub level_1: Option<String>,
    pub level_2: Option<String>,
    pub level_3: Option<String>,
    pub column_text: String,
    pub uom: Option<String>,
    pub factor: f64,
    pub ghg_unit: Option<String>,
    pub source: String,
    pub region: Option<String>,
    pub currency: String,
}

/// Parse a factor CSV, stamping dataset metadata onto each row
pub fn read_factors<R: Read>(
    reader: R,
    file_name: &str,
    meta: &DatasetMeta,
) -> IngestResult<Vec<IngestedFactor>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = FactorColumns::detect(rdr.headers()?)?;
    let implied_unit = columns.implied_ghg_unit();
    let currency = meta
        .currency
        .as_deref()
        .and_then(|c| clean_text(Some(c)))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let mut factors = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        let cell = |col: Option<usize>| col.and_then(|c| clean_text(record.get(c)));

        let column_text = cell(Some(columns.text)).ok_or(IngestError::MissingText { row })?;
        let raw_factor = record.get(columns.factor).unwrap_or_default();
        let factor = raw_factor
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| IngestError::InvalidFactor {
                row,
                raw: raw_factor.to_string(),
            })?;

        factors.push(IngestedFactor {
            dataset_id: meta.dataset_id,
            file_name: file_name.to_string(),
            year: meta.year,
            original_id: cell(columns.id),
            scope: cell(columns.scope),
            level_1: cell(columns.level_1),
            level_2: cell(columns.level_2),
            level_3: cell(columns.level_3),
            column_text,
            uom: cell(columns.uom),
            factor,
            ghg_unit: match columns.ghg_unit {
                Some(_) => cell(columns.ghg_unit),
                None => implied_unit.clone(),
            },
            source: meta.source.clone(),
            region: meta.region.clone(),
            currency: currency.clone(),
        });
    }

    info!(
        dataset_id = meta.dataset_id,
        file_name,
        rows = factors.len(),
        "parsed emission factor file"
    );
    Ok(factors)
}

/// Parse a factor CSV file from disk
pub fn read_factors_from_path(
    path: &Path,
    meta: &DatasetMeta,
) -> crate::error::NziResult<Vec<IngestedFactor>> {
    let file = std::fs::File::open(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(read_factors(file, &file_name, meta)?)
}
