//! Emission factor registry: datasets and their factor rows

use anyhow::Context;
use async_trait::async_trait;
use nzi_types::{DatasetMeta, EmissionFactor};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::NziResult;
use crate::ingest::IngestedFactor;
use crate::sources::{FactorQuery, FactorSource};

#[derive(Clone)]
pub struct PgFactorRepository {
    pool: PgPool,
}

fn factor_from_row(row: &PgRow) -> EmissionFactor {
    EmissionFactor {
        factor_id: row.get("factor_id"),
        dataset_id: row.get("dataset_id"),
        value: row.get("factor"),
        ghg_unit: row.get("ghg_unit"),
        uom: row.get("uom"),
        scope: row.get("scope"),
        level_1: row.get("level_1"),
        level_2: row.get("level_2"),
        level_3: row.get("level_3"),
        column_text: row.get("column_text"),
    }
}

/// `ILIKE` pattern matching `text` literally anywhere in the column
fn contains_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl PgFactorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get_factor(&self, factor_id: i64) -> Result<Option<EmissionFactor>, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT factor_id, dataset_id, factor, ghg_unit, uom, scope,
                      level_1, level_2, level_3, column_text
               FROM factor_lookup
               WHERE factor_id = $1"#,
        )
        .bind(factor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(factor_from_row))
    }

    pub async fn search(&self, query: &FactorQuery) -> Result<Vec<EmissionFactor>, sqlx::Error> {
        let Some(text) = query.search_text() else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"SELECT factor_id, dataset_id, factor, ghg_unit, uom, scope,
                      level_1, level_2, level_3, column_text
               FROM factor_lookup
               WHERE ($1::BIGINT IS NULL OR dataset_id = $1)
                 AND ($2::TEXT IS NULL OR lower(scope) = lower($2))
                 AND (column_text ILIKE $3 ESCAPE '\'
                      OR level_1 ILIKE $3 ESCAPE '\'
                      OR level_2 ILIKE $3 ESCAPE '\'
                      OR level_3 ILIKE $3 ESCAPE '\')
               ORDER BY factor_id DESC
               LIMIT $4"#,
        )
        .bind(query.dataset_id)
        .bind(query.scope.as_deref())
        .bind(contains_pattern(text))
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(factor_from_row).collect())
    }

    /// Dataset metadata by id
    pub async fn get_dataset(&self, dataset_id: i64) -> Result<Option<DatasetMeta>, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT dataset_id, name, source, region, currency, year, version
               FROM datasets
               WHERE dataset_id = $1"#,
        )
        .bind(dataset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| DatasetMeta {
            dataset_id: row.get("dataset_id"),
            name: row.get("name"),
            source: row.get("source"),
            region: row.get("region"),
            currency: row.get("currency"),
            year: row.get("year"),
            version: row.get("version"),
        }))
    }

    /// Register a dataset; the `dataset_id` of `meta` is ignored and the new id returned
    pub async fn create_dataset(&self, meta: &DatasetMeta) -> anyhow::Result<i64> {
        let dataset_id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO datasets (name, source, region, currency, year, version)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING dataset_id"#,
        )
        .bind(&meta.name)
        .bind(&meta.source)
        .bind(&meta.region)
        .bind(&meta.currency)
        .bind(meta.year)
        .bind(&meta.version)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create dataset")?;

        info!(dataset_id, name = %meta.name, "Created factor dataset");
        Ok(dataset_id)
    }

    /// Insert parsed factor rows in one transaction
    pub async fn insert_factors(&self, factors: &[IngestedFactor]) -> anyhow::Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin factor import transaction")?;

        for factor in factors {
            sqlx::query(
                r#"INSERT INTO factor_lookup (
                       dataset_id, file_name, year, original_id, scope,
                       level_1, level_2, level_3, column_text, uom,
                       factor, ghg_unit, source, region, currency
                   ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
            )
            .bind(factor.dataset_id)
            .bind(&factor.file_name)
            .bind(factor.year)
            .bind(&factor.original_id)
            .bind(&factor.scope)
            .bind(&factor.level_1)
            .bind(&factor.level_2)
            .bind(&factor.level_3)
            .bind(&factor.column_text)
            .bind(&factor.uom)
            .bind(factor.factor)
            .bind(&factor.ghg_unit)
            .bind(&factor.source)
            .bind(&factor.region)
            .bind(&factor.currency)
            .execute(&mut *tx)
            .await
            .context("Failed to insert emission factor")?;
        }

        tx.commit()
            .await
            .context("Failed to commit factor import")?;

        let count = factors.len() as u64;
        info!(rows = count, "Imported emission factors");
        Ok(count)
    }
}

#[async_trait]
impl FactorSource for PgFactorRepository {
    async fn factor(&self, factor_id: i64) -> NziResult<Option<EmissionFactor>> {
        Ok(self.get_factor(factor_id).await?)
    }

    async fn search_factors(&self, query: &FactorQuery) -> NziResult<Vec<EmissionFactor>> {
        Ok(self.search(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("diesel"), "%diesel%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("level_1"), "%level\\_1%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }
}
