//! Scope entry repository: per-job activity and spend lines
//!
//! Entries are written from a [`PreparedEntry`], so every stored row has been
//! validated and calculated by the entry service. Deletion is a soft archive.

use anyhow::Context;
use nzi_types::{FactorMethod, Scope, ScopeConfig, ScopeEntry};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::services::PreparedEntry;

#[derive(Clone)]
pub struct PgScopeEntryRepository {
    pool: PgPool,
}

const ENTRY_COLUMNS: &str = r#"entry_id, job_id, scope, method, category, subcategory, description,
       amount, unit, dataset_id, factor_id, factor_value, calculated_tco2e,
       override_tco2e, override_reason, notes, is_archived, updated_at"#;

fn entry_from_row(row: &PgRow) -> anyhow::Result<ScopeEntry> {
    let scope: String = row.get("scope");
    let method: Option<String> = row.get("method");
    Ok(ScopeEntry {
        entry_id: row.get("entry_id"),
        job_id: row.get("job_id"),
        scope: scope.parse::<Scope>().context("Invalid scope on stored entry")?,
        method: FactorMethod::parse_lenient(method.as_deref()),
        category: row.get("category"),
        subcategory: row.get("subcategory"),
        description: row.get("description"),
        amount: row.get("amount"),
        unit: row.get("unit"),
        dataset_id: row.get("dataset_id"),
        factor_id: row.get("factor_id"),
        factor_value: row.get("factor_value"),
        calculated_tco2e: row.get("calculated_tco2e"),
        override_tco2e: row.get("override_tco2e"),
        override_reason: row.get("override_reason"),
        notes: row.get("notes"),
        is_archived: row.get("is_archived"),
        updated_at: row.get("updated_at"),
    })
}

impl PgScopeEntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Scope settings for a job; jobs without a row use the defaults
    pub async fn scope_config(&self, job_id: i64, scope: Scope) -> Result<ScopeConfig, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT include_scope, dataset_id, factor_method
               FROM job_scope_config
               WHERE job_id = $1 AND scope = $2"#,
        )
        .bind(job_id)
        .bind(scope.label())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => {
                let method: Option<String> = row.get("factor_method");
                ScopeConfig {
                    include_scope: row.get("include_scope"),
                    dataset_id: row.get("dataset_id"),
                    factor_method: FactorMethod::parse_lenient(method.as_deref()),
                }
            }
            None => ScopeConfig::default(),
        })
    }

    pub async fn upsert_scope_config(
        &self,
        job_id: i64,
        scope: Scope,
        config: &ScopeConfig,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO job_scope_config (job_id, scope, include_scope, dataset_id, factor_method)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (job_id, scope) DO UPDATE
               SET include_scope = EXCLUDED.include_scope,
                   dataset_id = EXCLUDED.dataset_id,
                   factor_method = EXCLUDED.factor_method"#,
        )
        .bind(job_id)
        .bind(scope.label())
        .bind(config.include_scope)
        .bind(config.dataset_id)
        .bind(config.factor_method.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to save scope configuration")?;

        info!(job_id, %scope, "Saved scope configuration");
        Ok(())
    }

    pub async fn insert(&self, entry: &PreparedEntry) -> anyhow::Result<i64> {
        let calc = &entry.calculation;
        let entry_id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO crp_scope_entries (
                   job_id, scope, method, category, subcategory, description,
                   amount, unit, dataset_id, factor_id, factor_value,
                   calculated_tco2e, override_tco2e, override_reason, notes, updated_at
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, now())
               RETURNING entry_id"#,
        )
        .bind(entry.job_id)
        .bind(entry.scope.label())
        .bind(entry.method.as_str())
        .bind(&entry.category)
        .bind(&entry.subcategory)
        .bind(&entry.description)
        .bind(entry.amount)
        .bind(&entry.unit)
        .bind(entry.dataset_id)
        .bind(entry.factor_id)
        .bind(entry.factor_value)
        .bind(calc.calculated_tco2e)
        .bind(calc.override_tco2e)
        .bind(&calc.override_reason)
        .bind(&entry.notes)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert scope entry")?;

        info!(entry_id, job_id = entry.job_id, scope = %entry.scope, "Inserted scope entry");
        Ok(entry_id)
    }

    /// Replace an entry's fields with a freshly prepared version; false if absent
    pub async fn update(&self, entry_id: i64, entry: &PreparedEntry) -> anyhow::Result<bool> {
        let calc = &entry.calculation;
        let result = sqlx::query(
            r#"UPDATE crp_scope_entries
               SET method = $2, category = $3, subcategory = $4, description = $5,
                   amount = $6, unit = $7, dataset_id = $8, factor_id = $9,
                   factor_value = $10, calculated_tco2e = $11, override_tco2e = $12,
                   override_reason = $13, notes = $14, updated_at = now()
               WHERE entry_id = $1"#,
        )
        .bind(entry_id)
        .bind(entry.method.as_str())
        .bind(&entry.category)
        .bind(&entry.subcategory)
        .bind(&entry.description)
        .bind(entry.amount)
        .bind(&entry.unit)
        .bind(entry.dataset_id)
        .bind(entry.factor_id)
        .bind(entry.factor_value)
        .bind(calc.calculated_tco2e)
        .bind(calc.override_tco2e)
        .bind(&calc.override_reason)
        .bind(&entry.notes)
        .execute(&self.pool)
        .await
        .context("Failed to update scope entry")?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(entry_id, "Updated scope entry");
        }
        Ok(updated)
    }

    /// Soft-delete an entry; false if absent
    pub async fn archive(&self, entry_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"UPDATE crp_scope_entries
               SET is_archived = TRUE, updated_at = now()
               WHERE entry_id = $1"#,
        )
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .context("Failed to archive scope entry")?;

        let archived = result.rows_affected() > 0;
        if archived {
            info!(entry_id, "Archived scope entry");
        }
        Ok(archived)
    }

    pub async fn get(&self, entry_id: i64) -> anyhow::Result<Option<ScopeEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM crp_scope_entries WHERE entry_id = $1");
        let row = sqlx::query(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load scope entry")?;

        row.as_ref().map(entry_from_row).transpose()
    }

    /// Entries for a job's scope, newest first
    pub async fn list(
        &self,
        job_id: i64,
        scope: Scope,
        include_archived: bool,
    ) -> anyhow::Result<Vec<ScopeEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM crp_scope_entries
             WHERE job_id = $1 AND scope = $2 AND ($3 OR is_archived = FALSE)
             ORDER BY entry_id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(job_id)
            .bind(scope.label())
            .bind(include_archived)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list scope entries")?;

        rows.iter().map(entry_from_row).collect()
    }
}
