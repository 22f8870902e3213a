use energy_client::domain::{Complex, EnergyRecord, RequestMonth};
use tokio_util::sync::CancellationToken;

use crate::{
    sources::energy_api::EnergyApi,
    transform::{classify_response, Classification},
};

/// Why the month loop for one complex ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every pending month was attempted.
    Exhausted,
    /// Cancellation was requested before the next month.
    Cancelled,
    /// The daily quota ran out; the run-wide token has been cancelled.
    QuotaExhausted,
    /// A response had an unexpected shape; remaining months are left for a
    /// later run.
    Structural,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectOutcome {
    /// Successful months in request order.
    pub records: Vec<EnergyRecord>,
    pub soft_failures: usize,
    pub stop: StopReason,
}

/// Fetch `months` of `complex` one at a time, in order.
///
/// Each month is attempted exactly once. The token is checked before every
/// fetch; an in-flight fetch always completes and is classified. Quota
/// exhaustion cancels `cancel` so the driver stops the whole run.
pub async fn collect_months<A>(
    api: &A,
    complex: &Complex,
    months: &[RequestMonth],
    cancel: &CancellationToken,
) -> CollectOutcome
where
    A: EnergyApi + ?Sized,
{
    let mut records = Vec::new();
    let mut soft_failures = 0;

    for &month in months {
        if cancel.is_cancelled() {
            tracing::info!(
                kapt_code = %complex.code,
                name = %complex.name,
                %month,
                "cancellation requested; stopping before next month"
            );
            return CollectOutcome {
                records,
                soft_failures,
                stop: StopReason::Cancelled,
            };
        }

        tracing::debug!(kapt_code = %complex.code, name = %complex.name, %month, "requesting month");

        let classification = match api.fetch(&complex.code, month).await {
            Ok(response) => classify_response(&complex.code, month, response),
            Err(e) => Classification::Structural(e.to_string()),
        };
        metrics::counter!("energy_api_requests_total", "outcome" => classification.outcome_label()).increment(1);

        match classification {
            Classification::Success(record) => {
                tracing::info!(kapt_code = %complex.code, name = %complex.name, %month, "month collected");
                records.push(record);
            }
            Classification::SoftFailure {
                result_code,
                result_msg,
                body,
            } => {
                soft_failures += 1;
                tracing::warn!(
                    kapt_code = %complex.code,
                    name = %complex.name,
                    %month,
                    result_code = %result_code,
                    result_msg = result_msg.as_deref().unwrap_or(""),
                    body = %body.map(|b| b.to_string()).unwrap_or_default(),
                    "API reported an error for month; skipping"
                );
            }
            Classification::QuotaExhausted => {
                tracing::error!(
                    kapt_code = %complex.code,
                    name = %complex.name,
                    %month,
                    "daily API request quota exceeded; stopping the run"
                );
                cancel.cancel();
                return CollectOutcome {
                    records,
                    soft_failures,
                    stop: StopReason::QuotaExhausted,
                };
            }
            Classification::Structural(reason) => {
                tracing::error!(
                    kapt_code = %complex.code,
                    name = %complex.name,
                    %month,
                    error = %reason,
                    "unexpected API response; abandoning remaining months of complex"
                );
                return CollectOutcome {
                    records,
                    soft_failures,
                    stop: StopReason::Structural,
                };
            }
        }
    }

    CollectOutcome {
        records,
        soft_failures,
        stop: StopReason::Exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{no_data, ok, quota, ScriptedApi};
    use serde_json::json;

    fn months(tokens: &[&str]) -> Vec<RequestMonth> {
        tokens.iter().map(|t| t.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn fetches_each_month_once_in_order() {
        let api = ScriptedApi::default()
            .respond("A1", "202412", ok(json!({"heat": 1})))
            .respond("A1", "202501", no_data())
            .respond("A1", "202502", ok(json!({"heat": 3})));
        let complex = Complex::new("A1", "First", "20241201");

        let outcome = collect_months(
            &api,
            &complex,
            &months(&["202412", "202501", "202502"]),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.stop, StopReason::Exhausted);
        assert_eq!(outcome.soft_failures, 1);
        let collected: Vec<String> = outcome.records.iter().map(|r| r.request_month.to_string()).collect();
        assert_eq!(collected, vec!["202412", "202502"]);
        assert_eq!(
            api.calls(),
            vec![
                ("A1".to_string(), "202412".to_string()),
                ("A1".to_string(), "202501".to_string()),
                ("A1".to_string(), "202502".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn quota_cancels_the_token_and_keeps_prior_records() {
        let api = ScriptedApi::default()
            .respond("A1", "202001", ok(json!({"heat": 1})))
            .respond("A1", "202002", quota());
        let complex = Complex::new("A1", "First", "20200101");
        let cancel = CancellationToken::new();

        let outcome = collect_months(&api, &complex, &months(&["202001", "202002", "202003"]), &cancel).await;

        assert_eq!(outcome.stop, StopReason::QuotaExhausted);
        assert_eq!(outcome.records.len(), 1);
        assert!(cancel.is_cancelled());
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn structural_failure_leaves_the_token_alone() {
        let api = ScriptedApi::default().respond("A1", "202001", ok(json!({"heat": 1})));
        let complex = Complex::new("A1", "First", "20200101");
        let cancel = CancellationToken::new();

        let outcome = collect_months(&api, &complex, &months(&["202001", "202002", "202003"]), &cancel).await;

        assert_eq!(outcome.stop, StopReason::Structural);
        assert_eq!(outcome.records.len(), 1);
        assert!(!cancel.is_cancelled());
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_fetching() {
        let api = ScriptedApi::default();
        let complex = Complex::new("A1", "First", "20200101");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = collect_months(&api, &complex, &months(&["202001"]), &cancel).await;

        assert_eq!(outcome.stop, StopReason::Cancelled);
        assert!(outcome.records.is_empty());
        assert!(api.calls().is_empty());
    }
}
