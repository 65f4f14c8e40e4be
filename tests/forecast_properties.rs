//! Property tests for the target forecast engine

use nzi_pro::baseline::Baseline;
use nzi_pro::forecast::{build_forecast, project_scope, ForecastParams};
use nzi_types::{Scope, ScopeValues};
use proptest::prelude::*;

// -- Strategy helpers --

/// Years with `baseline <= interim < net_zero`
fn arb_ordered_years() -> impl Strategy<Value = (i32, i32, i32)> {
    (2000i32..2040, 0i32..30, 1i32..30)
        .prop_map(|(baseline, to_interim, to_net_zero)| {
            let interim = baseline + to_interim;
            (baseline, interim, interim + to_net_zero)
        })
}

fn arb_pct() -> impl Strategy<Value = u8> {
    0u8..=100
}

fn arb_emissions() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.0f64..1.0e6]
}

fn arb_baseline() -> impl Strategy<Value = Baseline> {
    (arb_emissions(), arb_emissions(), arb_emissions())
        .prop_map(|(s1, s2, s3)| Baseline::new(s1, s2, s3))
}

proptest! {
    #[test]
    fn row_count_matches_year_span(
        (baseline_year, interim_year, net_zero_year) in arb_ordered_years(),
        pct in arb_pct(),
        baseline in arb_baseline(),
    ) {
        let params = ForecastParams::new(baseline_year, net_zero_year, interim_year, ScopeValues::uniform(pct));
        let table = build_forecast(&params, &baseline);

        prop_assert_eq!(table.len(), (net_zero_year - baseline_year + 1) as usize);
        for (idx, row) in table.rows().iter().enumerate() {
            prop_assert_eq!(row.year, baseline_year + idx as i32);
        }
    }

    #[test]
    fn total_is_exact_sum(
        (baseline_year, interim_year, net_zero_year) in arb_ordered_years(),
        pcts in (arb_pct(), arb_pct(), arb_pct()),
        baseline in arb_baseline(),
    ) {
        let params = ForecastParams::new(
            baseline_year,
            net_zero_year,
            interim_year,
            ScopeValues::new(pcts.0, pcts.1, pcts.2),
        );
        for row in build_forecast(&params, &baseline).rows() {
            prop_assert_eq!(row.total, row.scope_1 + row.scope_2 + row.scope_3);
        }
    }

    #[test]
    fn zero_baseline_stays_zero(
        (baseline_year, interim_year, net_zero_year) in arb_ordered_years(),
        pct in arb_pct(),
        e0 in 0.0f64..1.0e6,
    ) {
        let params = ForecastParams::new(baseline_year, net_zero_year, interim_year, ScopeValues::uniform(pct));
        let table = build_forecast(&params, &Baseline::new(e0, 0.0, 0.0));
        for row in table.rows() {
            prop_assert_eq!(row.scope_2, 0.0);
            prop_assert_eq!(row.scope_3, 0.0);
        }
    }

    #[test]
    fn non_increasing_and_reaches_zero(
        (baseline_year, interim_year, net_zero_year) in arb_ordered_years(),
        pct in arb_pct(),
        e0 in 1.0f64..1.0e6,
    ) {
        let params = ForecastParams::new(baseline_year, net_zero_year, interim_year, ScopeValues::uniform(pct));
        let table = build_forecast(&params, &Baseline::new(e0, 0.0, 0.0));
        let series = table.series(Scope::Scope1);

        for pair in series.windows(2) {
            prop_assert!(pair[1].1 <= pair[0].1 + 1e-9 * e0);
        }
        prop_assert!(series.iter().all(|(_, v)| *v >= 0.0 && *v <= e0));
        prop_assert_eq!(series.last().map(|(_, v)| *v), Some(0.0));
    }

    #[test]
    fn baseline_and_interim_points(
        (baseline_year, interim_year, net_zero_year) in arb_ordered_years(),
        pct in arb_pct(),
        e0 in 1.0f64..1.0e6,
    ) {
        prop_assume!(interim_year > baseline_year);
        let params = ForecastParams::new(baseline_year, net_zero_year, interim_year, ScopeValues::uniform(pct));

        prop_assert_eq!(project_scope(&params, e0, pct, baseline_year), e0);
        let at_interim = project_scope(&params, e0, pct, interim_year);
        let expected = e0 * (1.0 - f64::from(pct) / 100.0);
        prop_assert!((at_interim - expected).abs() <= 1e-9 * e0);
    }
}

#[test]
fn test_reference_trajectory() {
    let params = ForecastParams::new(2024, 2050, 2035, ScopeValues::uniform(50));
    let mut baseline = std::collections::HashMap::new();
    baseline.insert("Scope 1".to_string(), 100.0);
    let table = build_forecast(&params, &Baseline::from_map(&baseline));

    assert_eq!(table.at(2024).map(|r| r.scope_1), Some(100.0));
    assert_eq!(table.at(2035).map(|r| r.scope_1), Some(50.0));
    assert_eq!(table.at(2050).map(|r| r.scope_1), Some(0.0));
    assert_eq!(table.at(2030).map(|r| r.scope_2), Some(0.0));
}
