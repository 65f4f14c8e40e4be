//! Postgres integration tests
//!
//! Run against a scratch database:
//!
//! ```bash
//! TEST_DATABASE_URL=postgresql://localhost/nzi_test?sslmode=disable \
//!     cargo test --features database -- --ignored
//! ```

#[cfg(feature = "database")]
mod db_tests {
    use anyhow::Result;
    use nzi_pro::calculation::RowCalculation;
    use nzi_pro::database::{DatabaseConfig, DatabaseManager};
    use nzi_pro::ingest::read_factors;
    use nzi_pro::services::{EntryDraft, ScopeEntryService, TargetForecastService};
    use nzi_pro::sources::{ClientSource, FactorQuery, FactorSource};
    use nzi_types::{ClientTargets, DatasetMeta, Scope, ScopeConfig, ScopeValues};
    use std::path::Path;
    use std::sync::Arc;

    // =========================================================================
    // TEST INFRASTRUCTURE
    // =========================================================================

    async fn manager() -> Result<DatabaseManager> {
        let url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/nzi_test?sslmode=disable".into());
        let manager = DatabaseManager::new(DatabaseConfig::new(url, 2)).await?;
        manager
            .run_migrations(&Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
            .await?;
        Ok(manager)
    }

    async fn create_client(manager: &DatabaseManager, name: &str) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "INSERT INTO clients (client_name) VALUES ($1) RETURNING db_id",
        )
        .bind(name)
        .fetch_one(manager.pool())
        .await?)
    }

    async fn create_report(manager: &DatabaseManager, client_id: i64, year: i32) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "INSERT INTO crp_reports (client_db_id, reporting_year) VALUES ($1, $2) RETURNING crp_id",
        )
        .bind(client_id)
        .bind(year)
        .fetch_one(manager.pool())
        .await?)
    }

    async fn add_activity(
        manager: &DatabaseManager,
        client_id: i64,
        crp_id: i64,
        scope: &str,
        emissions: f64,
        override_tco2e: Option<f64>,
        archived: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO activity_data
                   (client_db_id, crp_id, scope, emissions_tco2e, override_tco2e, override_reason, is_archived)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(client_id)
        .bind(crp_id)
        .bind(scope)
        .bind(emissions)
        .bind(override_tco2e)
        .bind(override_tco2e.filter(|v| *v > 0.0).map(|_| "Metered"))
        .bind(archived)
        .execute(manager.pool())
        .await?;
        Ok(())
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    #[ignore]
    async fn test_migrations_are_idempotent() -> Result<()> {
        let manager = manager().await?;
        let report = manager
            .run_migrations(&Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
            .await?;
        assert!(report.applied.is_empty());
        assert!(report.checksum_mismatches.is_empty());
        Ok(())
    }

    #[tokio::test]
    #[ignore]
    async fn test_client_targets_and_baseline() -> Result<()> {
        let manager = manager().await?;
        let repo = manager.client_repository();
        let client_id = create_client(&manager, "Baseline Test Ltd").await?;

        let targets = repo.client_targets(client_id).await?.expect("client exists");
        assert_eq!(targets.net_zero_year, 2050);
        assert_eq!(targets.interim_pct, ScopeValues::uniform(50));

        let updated = ClientTargets {
            interim_pct: ScopeValues::new(40, 50, 30),
            ..targets
        };
        assert!(repo.update_targets(&updated).await?);

        let too_high = ClientTargets {
            interim_pct: ScopeValues::new(40, 120, 30),
            ..updated.clone()
        };
        assert!(repo.update_targets(&too_high).await.is_err());
        assert_eq!(repo.client_targets(client_id).await?, Some(updated.clone()));

        let crp_2023 = create_report(&manager, client_id, 2023).await?;
        let crp_2024 = create_report(&manager, client_id, 2024).await?;
        add_activity(&manager, client_id, crp_2023, "Scope 1", 10.0, None, false).await?;
        add_activity(&manager, client_id, crp_2023, "scope 1 - gas", 5.0, Some(8.0), false).await?;
        add_activity(&manager, client_id, crp_2023, "Scope 2", 99.0, None, true).await?;
        // A zero override is no override: the calculated value is summed
        add_activity(&manager, client_id, crp_2023, "Scope 3", 4.0, Some(0.0), false).await?;
        add_activity(&manager, client_id, crp_2024, "Scope 3", 1.0, None, false).await?;

        assert_eq!(repo.earliest_reporting_year(client_id).await?, Some(2023));
        let baseline = repo.baseline_emissions(client_id, 2023).await?;
        assert_eq!(baseline.get(Scope::Scope1), 18.0);
        assert_eq!(baseline.get(Scope::Scope2), 0.0);
        assert_eq!(baseline.get(Scope::Scope3), 4.0);

        let service = TargetForecastService::new(Arc::new(repo));
        let forecast = service.forecast_for_client(client_id, 2026).await?;
        assert_eq!(forecast.baseline_year.year, 2023);
        assert_eq!(forecast.table.len(), 28);
        Ok(())
    }

    #[tokio::test]
    #[ignore]
    async fn test_factor_import_search_and_entries() -> Result<()> {
        let manager = manager().await?;
        let factors = manager.factor_repository();

        let mut meta = DatasetMeta {
            dataset_id: 0,
            name: "Integration factors".to_string(),
            source: "DESNZ".to_string(),
            region: Some("UK".to_string()),
            currency: None,
            year: 2024,
            version: None,
        };
        meta.dataset_id = factors.create_dataset(&meta).await?;

        let csv = "Scope,Level 1,Column Text,UOM,kgCO2e per unit\n\
                   Scope 1,Fuels,Diesel (average biofuel blend),litres,2.51279\n\
                   Scope 2,Electricity,Electricity: UK,kWh,0.20705\n";
        let parsed = read_factors(csv.as_bytes(), "integration.csv", &meta)?;
        assert_eq!(factors.insert_factors(&parsed).await?, 2);

        let query = FactorQuery::new("diesel")
            .in_dataset(Some(meta.dataset_id))
            .in_scope("scope 1");
        let found = factors.search_factors(&query).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ghg_unit.as_deref(), Some("kgCO2e"));
        assert!(factors.search_factors(&FactorQuery::new("  ")).await?.is_empty());
        // Wildcard characters match literally, as in the in-memory source
        let wildcard = FactorQuery::new("%").in_dataset(Some(meta.dataset_id));
        assert!(factors.search_factors(&wildcard).await?.is_empty());

        let client_id = create_client(&manager, "Entry Test Ltd").await?;
        let job_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO jobs (client_db_id, title) VALUES ($1, 'CRP 2024') RETURNING job_id",
        )
        .bind(client_id)
        .fetch_one(manager.pool())
        .await?;

        let entries = manager.scope_entry_repository();
        assert_eq!(entries.scope_config(job_id, Scope::Scope1).await?, ScopeConfig::default());
        let config = ScopeConfig {
            dataset_id: Some(meta.dataset_id),
            ..ScopeConfig::default()
        };
        entries.upsert_scope_config(job_id, Scope::Scope1, &config).await?;
        assert_eq!(entries.scope_config(job_id, Scope::Scope1).await?, config);

        let service = ScopeEntryService::new(Arc::new(factors));
        let draft = EntryDraft {
            description: Some("Fleet diesel".to_string()),
            amount: 1000.0,
            factor_id: Some(found[0].factor_id),
            ..EntryDraft::default()
        };
        let prepared = service.prepare(job_id, Scope::Scope1, &config, &draft).await?;
        let entry_id = entries.insert(&prepared).await?;

        let stored = entries.get(entry_id).await?.expect("entry stored");
        assert!((stored.used_tco2e().unwrap() - 2.51279).abs() < 1e-9);

        let overridden = EntryDraft {
            override_tco2e: Some(3.0),
            override_reason: Some("Fuel card data".to_string()),
            ..draft
        };
        let prepared = service.prepare(job_id, Scope::Scope1, &config, &overridden).await?;
        assert!(entries.update(entry_id, &prepared).await?);
        let stored = entries.get(entry_id).await?.expect("entry stored");
        assert_eq!(stored.used_tco2e(), Some(3.0));
        assert!(matches!(
            prepared.calculation,
            RowCalculation { is_override: true, .. }
        ));

        assert!(entries.archive(entry_id).await?);
        assert!(entries.list(job_id, Scope::Scope1, false).await?.is_empty());
        assert_eq!(entries.list(job_id, Scope::Scope1, true).await?.len(), 1);
        Ok(())
    }
}
