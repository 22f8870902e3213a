//! Incremental collection of monthly energy records.
//!
//! For each roster complex the driver resolves the months still missing from
//! its energy file, fetches them one by one and appends the successes. The
//! on-disk months are the only state carried between runs, so re-running the
//! collector resumes where the previous run stopped.

pub mod collector;
pub mod targets;

use std::path::Path;

use energy_client::{
    domain::Complex,
    store::roster_queries::{self, RosterColumns},
};
use time::Date;
use tokio_util::sync::CancellationToken;

use crate::{
    sinks::{CsvAppender, SinkError},
    sources::energy_api::EnergyApi,
};
use collector::{collect_months, StopReason};
use targets::Resolution;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("roster error: {0}")]
    Roster(#[source] energy_client::Error),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Load the complexes to collect, in roster order.
pub fn load_roster(path: &Path, columns: &RosterColumns) -> Result<Vec<Complex>, PipelineError> {
    let roster = roster_queries::load_roster(path, columns).map_err(PipelineError::Roster)?;
    tracing::info!(complexes = roster.len(), path = %path.display(), "roster loaded");
    Ok(roster)
}

/// Where the driver currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Resolving,
    Fetching,
    Persisting,
    Terminated,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    RosterExhausted,
    Cancelled,
    QuotaExhausted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub complexes_total: usize,
    pub complexes_collected: usize,
    pub skipped_invalid_date: usize,
    pub skipped_complete: usize,
    pub skipped_unreadable: usize,
    pub structural_aborts: usize,
    pub soft_failures: usize,
    pub months_persisted: usize,
    pub termination: Option<Termination>,
}

pub struct BatchDriver<A> {
    api: A,
    appender: CsvAppender,
    today: Date,
    cancel: CancellationToken,
    state: RunState,
}

impl<A: EnergyApi> BatchDriver<A> {
    pub fn new(api: A, appender: CsvAppender, today: Date, cancel: CancellationToken) -> Self {
        Self {
            api,
            appender,
            today,
            cancel,
            state: RunState::Running,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        tracing::trace!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    /// Process `roster` in order until it is exhausted or cancellation is
    /// requested.
    ///
    /// Records fetched for the complex in flight when the run stops are
    /// persisted before returning. Only sink failures abort the run with an
    /// error; per-complex problems are logged and skipped.
    pub async fn run(&mut self, roster: &[Complex]) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary {
            complexes_total: roster.len(),
            ..RunSummary::default()
        };

        for (idx, complex) in roster.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.termination.get_or_insert(Termination::Cancelled);
                break;
            }

            self.transition(RunState::Resolving);
            let path = self.appender.path_for(complex);
            let (window, months) = match targets::resolve(complex, self.today, &path) {
                Ok(Resolution::Pending { window, months }) => (window, months),
                Ok(Resolution::InvalidApprovalDate(raw)) => {
                    tracing::warn!(
                        kapt_code = %complex.code,
                        name = %complex.name,
                        approval_date = %raw,
                        "approval date is not a valid date; skipping complex"
                    );
                    metrics::counter!("complexes_skipped_total", "reason" => "invalid_date").increment(1);
                    summary.skipped_invalid_date += 1;
                    self.transition(RunState::Running);
                    continue;
                }
                Ok(Resolution::Complete(window)) if window.is_empty() => {
                    tracing::info!(
                        kapt_code = %complex.code,
                        name = %complex.name,
                        approval_date = %complex.approval_date,
                        "no complete month since approval yet; skipping complex"
                    );
                    metrics::counter!("complexes_skipped_total", "reason" => "too_recent").increment(1);
                    summary.skipped_complete += 1;
                    self.transition(RunState::Running);
                    continue;
                }
                Ok(Resolution::Complete(window)) => {
                    tracing::info!(
                        kapt_code = %complex.code,
                        name = %complex.name,
                        start = %window.start,
                        end = %window.end,
                        "all months already collected"
                    );
                    metrics::counter!("complexes_skipped_total", "reason" => "complete").increment(1);
                    summary.skipped_complete += 1;
                    self.transition(RunState::Running);
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        kapt_code = %complex.code,
                        name = %complex.name,
                        path = %path.display(),
                        error = %e,
                        "cannot read collected months; skipping complex"
                    );
                    metrics::counter!("complexes_skipped_total", "reason" => "unreadable").increment(1);
                    summary.skipped_unreadable += 1;
                    self.transition(RunState::Running);
                    continue;
                }
            };

            tracing::info!(
                progress = %format!("{}/{}", idx + 1, roster.len()),
                kapt_code = %complex.code,
                name = %complex.name,
                start = %window.start,
                end = %window.end,
                pending = months.len(),
                "collecting complex"
            );

            self.transition(RunState::Fetching);
            let outcome = collect_months(&self.api, complex, &months, &self.cancel).await;
            summary.soft_failures += outcome.soft_failures;

            if !outcome.records.is_empty() {
                self.transition(RunState::Persisting);
                let appended = self.appender.append(&path, &outcome.records)?;
                summary.months_persisted += appended.rows_written;
                summary.complexes_collected += 1;
                tracing::info!(
                    kapt_code = %complex.code,
                    name = %complex.name,
                    months = appended.rows_written,
                    path = %path.display(),
                    "complex data saved"
                );
            }

            match outcome.stop {
                StopReason::Exhausted => {}
                StopReason::Structural => summary.structural_aborts += 1,
                StopReason::Cancelled => {
                    summary.termination = Some(Termination::Cancelled);
                    break;
                }
                StopReason::QuotaExhausted => {
                    summary.termination = Some(Termination::QuotaExhausted);
                    break;
                }
            }
            self.transition(RunState::Running);
        }

        summary.termination.get_or_insert(Termination::RosterExhausted);
        self.transition(RunState::Terminated);
        Ok(summary)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{malformed, no_data, ok, quota, ScriptedApi};
    use super::*;
    use energy_client::store::energy_queries::collected_months;
    use serde_json::json;
    use std::fs;
    use time::macros::date;

    const TODAY: Date = date!(2020 - 04 - 10);

    fn month_tokens(path: &std::path::Path) -> Vec<String> {
        collected_months(path)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn full_script(api: ScriptedApi, code: &str) -> ScriptedApi {
        api.respond(code, "202001", ok(json!({"heat": 1})))
            .respond(code, "202002", ok(json!({"heat": 2})))
            .respond(code, "202003", ok(json!({"heat": 3})))
    }

    #[tokio::test]
    async fn single_complex_collects_months_before_current() {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![Complex::new("A1", "First", "20200115")];
        let api = full_script(ScriptedApi::default(), "A1");

        let mut driver = BatchDriver::new(api, CsvAppender::new(dir.path()), TODAY, CancellationToken::new());
        let summary = driver.run(&roster).await.unwrap();

        assert_eq!(summary.months_persisted, 3);
        assert_eq!(summary.termination, Some(Termination::RosterExhausted));
        assert_eq!(driver.state(), RunState::Terminated);
        assert_eq!(
            month_tokens(&dir.path().join("A1_First.csv")),
            vec!["202001", "202002", "202003"]
        );
    }

    #[tokio::test]
    async fn second_run_finds_nothing_pending() {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![Complex::new("A1", "First", "20200115")];

        let mut first = BatchDriver::new(
            full_script(ScriptedApi::default(), "A1"),
            CsvAppender::new(dir.path()),
            TODAY,
            CancellationToken::new(),
        );
        first.run(&roster).await.unwrap();

        let mut second = BatchDriver::new(
            ScriptedApi::default(),
            CsvAppender::new(dir.path()),
            TODAY,
            CancellationToken::new(),
        );
        let summary = second.run(&roster).await.unwrap();

        assert_eq!(summary.skipped_complete, 1);
        assert_eq!(summary.months_persisted, 0);
        assert!(second.api.calls().is_empty());

        let content = fs::read_to_string(dir.path().join("A1_First.csv")).unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[tokio::test]
    async fn soft_failures_are_skipped_and_retried_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![Complex::new("A1", "First", "20200115")];
        let api = ScriptedApi::default()
            .respond("A1", "202001", ok(json!({"heat": 1})))
            .respond("A1", "202002", no_data())
            .respond("A1", "202003", ok(json!({"heat": 3})));

        let mut driver = BatchDriver::new(api, CsvAppender::new(dir.path()), TODAY, CancellationToken::new());
        let summary = driver.run(&roster).await.unwrap();
        assert_eq!(summary.soft_failures, 1);
        assert_eq!(month_tokens(&dir.path().join("A1_First.csv")), vec!["202001", "202003"]);

        let mut rerun = BatchDriver::new(
            ScriptedApi::default().respond("A1", "202002", ok(json!({"heat": 2}))),
            CsvAppender::new(dir.path()),
            TODAY,
            CancellationToken::new(),
        );
        rerun.run(&roster).await.unwrap();
        assert_eq!(rerun.api.calls(), vec![("A1".to_string(), "202002".to_string())]);
        assert_eq!(
            month_tokens(&dir.path().join("A1_First.csv")),
            vec!["202001", "202002", "202003"]
        );
    }

    #[tokio::test]
    async fn quota_exhaustion_persists_earlier_months_and_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![
            Complex::new("A1", "First", "20200115"),
            Complex::new("A2", "Second", "20200115"),
        ];
        let api = ScriptedApi::default()
            .respond("A1", "202001", ok(json!({"heat": 1})))
            .respond("A1", "202002", quota())
            .respond("A1", "202003", ok(json!({"heat": 3})));
        let cancel = CancellationToken::new();

        let mut driver = BatchDriver::new(api, CsvAppender::new(dir.path()), TODAY, cancel.clone());
        let summary = driver.run(&roster).await.unwrap();

        assert_eq!(summary.termination, Some(Termination::QuotaExhausted));
        assert!(cancel.is_cancelled());
        assert_eq!(month_tokens(&dir.path().join("A1_First.csv")), vec!["202001"]);
        assert!(!dir.path().join("A2_Second.csv").exists());
        assert!(driver.api.calls().iter().all(|(code, _)| code == "A1"));
        assert_eq!(driver.api.calls().len(), 2);
    }

    #[tokio::test]
    async fn structural_error_persists_earlier_months_and_moves_on() {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![
            Complex::new("A1", "First", "20200115"),
            Complex::new("A2", "Second", "20200115"),
        ];
        let api = full_script(ScriptedApi::default(), "A2")
            .respond("A1", "202001", ok(json!({"heat": 1})))
            .respond("A1", "202002", malformed())
            .respond("A1", "202003", ok(json!({"heat": 3})));
        let cancel = CancellationToken::new();

        let mut driver = BatchDriver::new(api, CsvAppender::new(dir.path()), TODAY, cancel.clone());
        let summary = driver.run(&roster).await.unwrap();

        assert_eq!(summary.structural_aborts, 1);
        assert!(!cancel.is_cancelled());
        assert_eq!(month_tokens(&dir.path().join("A1_First.csv")), vec!["202001"]);
        assert_eq!(
            month_tokens(&dir.path().join("A2_Second.csv")),
            vec!["202001", "202002", "202003"]
        );
        assert!(!driver
            .api
            .calls()
            .contains(&("A1".to_string(), "202003".to_string())));
    }

    #[tokio::test]
    async fn invalid_dates_and_unreadable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A2_Broken.csv"), "month\n202001\n").unwrap();
        let roster = vec![
            Complex::new("A1", "NoDate", ""),
            Complex::new("A2", "Broken", "20200115"),
            Complex::new("A3", "Good", "20200301"),
        ];
        let api = ScriptedApi::default().respond("A3", "202003", ok(json!({"heat": 3})));

        let mut driver = BatchDriver::new(api, CsvAppender::new(dir.path()), TODAY, CancellationToken::new());
        let summary = driver.run(&roster).await.unwrap();

        assert_eq!(summary.skipped_invalid_date, 1);
        assert_eq!(summary.skipped_unreadable, 1);
        assert_eq!(summary.complexes_collected, 1);
        assert_eq!(month_tokens(&dir.path().join("A3_Good.csv")), vec!["202003"]);
    }

    #[tokio::test]
    async fn interrupt_mid_complex_drains_current_fetch_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![
            Complex::new("A1", "First", "20200115"),
            Complex::new("A2", "Second", "20200115"),
        ];
        let cancel = CancellationToken::new();
        let api = full_script(full_script(ScriptedApi::default(), "A1"), "A2").cancel_after(2, cancel.clone());

        let mut driver = BatchDriver::new(api, CsvAppender::new(dir.path()), TODAY, cancel);
        let summary = driver.run(&roster).await.unwrap();

        assert_eq!(summary.termination, Some(Termination::Cancelled));
        assert_eq!(month_tokens(&dir.path().join("A1_First.csv")), vec!["202001", "202002"]);
        assert!(!dir.path().join("A2_Second.csv").exists());
    }

    #[tokio::test]
    async fn complex_approved_this_month_is_skipped_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![Complex::new("A1", "Fresh", "20200402")];

        let mut driver = BatchDriver::new(ScriptedApi::default(), CsvAppender::new(dir.path()), TODAY, CancellationToken::new());
        let summary = driver.run(&roster).await.unwrap();

        assert_eq!(summary.skipped_complete, 1);
        assert!(driver.api.calls().is_empty());
        assert!(!dir.path().join("A1_Fresh.csv").exists());
    }

    #[test]
    fn roster_without_code_column_is_a_roster_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(&path, "단지명,사용승인일\nFirst,20200115\n").unwrap();

        let err = load_roster(&path, &RosterColumns::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Roster(energy_client::Error::MissingColumn { .. })));
    }

    #[tokio::test]
    async fn pre_cancelled_run_does_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let roster = vec![Complex::new("A1", "First", "20200115")];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut driver = BatchDriver::new(ScriptedApi::default(), CsvAppender::new(dir.path()), TODAY, cancel);
        let summary = driver.run(&roster).await.unwrap();

        assert_eq!(summary.termination, Some(Termination::Cancelled));
        assert!(driver.api.calls().is_empty());
    }
}
