//! Target forecast service
//!
//! Resolves a client's baseline year, pulls the baseline aggregate from the
//! client source and runs the forecast engine.

use nzi_types::ClientTargets;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::baseline::{resolve_baseline_year, Baseline, BaselineYear};
use crate::error::{NziError, NziResult};
use crate::forecast::{build_forecast, ForecastParams, ForecastTable, RangeWarning};
use crate::sources::ClientSource;

/// Forecast for one client together with the inputs that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientForecast {
    pub client_id: i64,
    pub baseline_year: BaselineYear,
    pub baseline: Baseline,
    pub params: ForecastParams,
    pub warnings: Vec<RangeWarning>,
    pub table: ForecastTable,
}

#[derive(Clone)]
pub struct TargetForecastService {
    clients: Arc<dyn ClientSource>,
}

impl TargetForecastService {
    pub fn new(clients: Arc<dyn ClientSource>) -> Self {
        Self { clients }
    }

    /// Load targets for a client; unknown clients are a `NotFound` error
    pub async fn targets(&self, client_id: i64) -> NziResult<ClientTargets> {
        self.clients
            .client_targets(client_id)
            .await?
            .ok_or_else(|| NziError::not_found("client", client_id))
    }

    /// Baseline year for a client: configured, earliest report, or `working_year`
    pub async fn baseline_year(
        &self,
        targets: &ClientTargets,
        working_year: i32,
    ) -> NziResult<BaselineYear> {
        let earliest = match targets.baseline_year {
            Some(_) => None,
            None => {
                self.clients
                    .earliest_reporting_year(targets.client_id)
                    .await?
            }
        };
        Ok(resolve_baseline_year(
            targets.baseline_year,
            earliest,
            working_year,
        ))
    }

    /// Full forecast for a client from its stored targets and history
    pub async fn forecast_for_client(
        &self,
        client_id: i64,
        working_year: i32,
    ) -> NziResult<ClientForecast> {
        let targets = self.targets(client_id).await?;
        let baseline_year = self.baseline_year(&targets, working_year).await?;
        let baseline = self
            .clients
            .baseline_emissions(client_id, baseline_year.year)
            .await?;

        let params = ForecastParams::from_targets(&targets, baseline_year.year);
        let warnings = params.check_range();
        for warning in &warnings {
            warn!(client_id, "forecast input out of range: {}", warning);
        }

        let table = build_forecast(&params, &baseline);
        info!(
            client_id,
            baseline_year = baseline_year.year,
            baseline_total = baseline.total(),
            rows = table.len(),
            "built client forecast"
        );

        Ok(ClientForecast {
            client_id,
            baseline_year,
            baseline,
            params,
            warnings,
            table,
        })
    }
}
