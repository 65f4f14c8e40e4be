//! Client repository: reduction targets and historical CRP aggregates

use anyhow::Context;
use async_trait::async_trait;
use nzi_types::{ClientTargets, Scope, ScopeValues};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::baseline::Baseline;
use crate::error::NziResult;
use crate::sources::ClientSource;

#[derive(Clone)]
pub struct PgClientRepository {
    pool: PgPool,
}

fn pct_from_db(value: i16) -> Result<u8, sqlx::Error> {
    u8::try_from(value)
        .ok()
        .filter(|pct| *pct <= 100)
        .ok_or_else(|| sqlx::Error::Decode(format!("interim percentage {value} outside 0-100").into()))
}

/// Percentages above 100 are rejected, never clamped
fn pct_to_db(scope: Scope, pct: u8) -> anyhow::Result<i16> {
    if pct > 100 {
        anyhow::bail!("{} interim reduction {}% exceeds 100%", scope, pct);
    }
    Ok(i16::from(pct))
}

impl PgClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get_targets(&self, client_id: i64) -> Result<Option<ClientTargets>, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT db_id, net_zero_year, interim_year,
                      interim_s1_pct, interim_s2_pct, interim_s3_pct, baseline_year
               FROM clients
               WHERE db_id = $1"#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ClientTargets {
            client_id: row.get("db_id"),
            net_zero_year: row.get("net_zero_year"),
            interim_year: row.get("interim_year"),
            interim_pct: ScopeValues::new(
                pct_from_db(row.get("interim_s1_pct"))?,
                pct_from_db(row.get("interim_s2_pct"))?,
                pct_from_db(row.get("interim_s3_pct"))?,
            ),
            baseline_year: row.get("baseline_year"),
        }))
    }

    /// Persist targets; returns false when the client does not exist
    pub async fn update_targets(&self, targets: &ClientTargets) -> anyhow::Result<bool> {
        let pct = &targets.interim_pct;
        let s1 = pct_to_db(Scope::Scope1, pct.scope_1)?;
        let s2 = pct_to_db(Scope::Scope2, pct.scope_2)?;
        let s3 = pct_to_db(Scope::Scope3, pct.scope_3)?;

        let result = sqlx::query(
            r#"UPDATE clients
               SET net_zero_year = $2, interim_year = $3,
                   interim_s1_pct = $4, interim_s2_pct = $5, interim_s3_pct = $6,
                   baseline_year = $7
               WHERE db_id = $1"#,
        )
        .bind(targets.client_id)
        .bind(targets.net_zero_year)
        .bind(targets.interim_year)
        .bind(s1)
        .bind(s2)
        .bind(s3)
        .bind(targets.baseline_year)
        .execute(&self.pool)
        .await
        .context("Failed to update client targets")?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(client_id = targets.client_id, "Updated client targets");
        }
        Ok(updated)
    }

    pub async fn earliest_year(&self, client_id: i64) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<i32>>(
            r#"SELECT MIN(reporting_year)
               FROM crp_reports
               WHERE client_db_id = $1"#,
        )
        .bind(client_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Per-scope-label sums of used tCO2e for one reporting year
    pub async fn scope_totals(
        &self,
        client_id: i64,
        reporting_year: i32,
    ) -> Result<Vec<(String, Option<f64>)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"SELECT a.scope AS scope,
                      SUM(CASE WHEN a.override_tco2e > 0 THEN a.override_tco2e
                               ELSE COALESCE(a.emissions_tco2e, 0) END) AS total
               FROM activity_data a
               JOIN crp_reports r ON r.crp_id = a.crp_id
               WHERE r.client_db_id = $1
                 AND r.reporting_year = $2
                 AND a.is_archived = FALSE
               GROUP BY a.scope"#,
        )
        .bind(client_id)
        .bind(reporting_year)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("scope"), row.get("total")))
            .collect())
    }
}

#[async_trait]
impl ClientSource for PgClientRepository {
    async fn client_targets(&self, client_id: i64) -> NziResult<Option<ClientTargets>> {
        Ok(self.get_targets(client_id).await?)
    }

    async fn earliest_reporting_year(&self, client_id: i64) -> NziResult<Option<i32>> {
        Ok(self.earliest_year(client_id).await?)
    }

    async fn baseline_emissions(&self, client_id: i64, reporting_year: i32) -> NziResult<Baseline> {
        let totals = self.scope_totals(client_id, reporting_year).await?;
        Ok(Baseline::from_rows(
            totals.iter().map(|(label, total)| (label.as_str(), *total)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_from_db_rejects_out_of_range() {
        assert_eq!(pct_from_db(50).unwrap(), 50);
        assert_eq!(pct_from_db(100).unwrap(), 100);
        assert!(pct_from_db(-5).is_err());
        assert!(pct_from_db(250).is_err());
    }

    #[test]
    fn test_pct_to_db_rejects_above_hundred() {
        assert_eq!(pct_to_db(Scope::Scope1, 0).unwrap(), 0);
        assert_eq!(pct_to_db(Scope::Scope2, 100).unwrap(), 100);
        let err = pct_to_db(Scope::Scope3, 120).unwrap_err();
        assert!(err.to_string().contains("120%"));
    }
}
