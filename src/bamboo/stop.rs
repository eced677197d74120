use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;

use super::client::{BambooClient, Query};
use super::types::{BuildResult, LifecycleState, PlanSummary, ResultList};
use crate::error::Result;

/// How many recent results are scanned for the running build.
const RECENT_RESULTS: usize = 5;

/// Outcome of a stop request.
///
/// "Nothing to do" is reported here with `success: false`, not as an error;
/// only transport failures while discovering the build are errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub cancellation: Option<Cancellation>,
}

/// Per-job results for the build that was found running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub build_key: String,
    pub stopped_jobs: Vec<String>,
    pub failed_jobs: Vec<String>,
}

impl StopOutcome {
    fn nothing_to_do(message: String) -> Self {
        Self {
            success: false,
            message,
            cancellation: None,
        }
    }

    fn from_cancellation(cancellation: Cancellation) -> Self {
        let stopped = cancellation.stopped_jobs.len();
        let message = if stopped > 0 {
            format!("Stopped {stopped} job(s) for build {}", cancellation.build_key)
        } else {
            format!(
                "No running jobs found to stop for build {}",
                cancellation.build_key
            )
        };

        Self {
            success: stopped > 0,
            message,
            cancellation: Some(cancellation),
        }
    }
}

impl BambooClient {
    /// Stop the running build of a plan.
    ///
    /// Cancellation is issued per job (`DELETE /queue/{jobKey}`); the queue
    /// endpoint ignores plan-level result keys. A failed cancellation is
    /// recorded in `failed_jobs` and the remaining jobs are still processed.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching the plan, its recent results or the
    /// running build's job tree fails.
    pub async fn stop_build(&self, plan_key: &str) -> Result<StopOutcome> {
        let plan: PlanSummary = self
            .get_as(&format!("/plan/{plan_key}"), &Query::new())
            .await?;

        if !plan.is_building {
            info!("Plan {plan_key} is not building, nothing to stop");
            return Ok(StopOutcome::nothing_to_do(format!(
                "Plan {plan_key} is not currently building"
            )));
        }

        // In-progress results are hidden from the default listing.
        let recent: ResultList = self
            .get_as(
                &format!("/result/{plan_key}"),
                &Query::new()
                    .set("includeAllStates", true)
                    .set("max-result", RECENT_RESULTS),
            )
            .await?;

        let Some(running) = recent
            .summaries()
            .iter()
            .find(|r| r.life_cycle_state == LifecycleState::InProgress)
        else {
            return Ok(StopOutcome::nothing_to_do(format!(
                "No running build found for plan {plan_key}"
            )));
        };

        let build: BuildResult = self
            .get_as(
                &format!("/result/{}", running.key),
                &Query::new().set("expand", "stages.stage.results.result"),
            )
            .await?;

        let cancellable: Vec<&str> = build
            .jobs()
            .filter(|job| job.life_cycle_state.is_cancellable())
            .map(|job| job.key.as_str())
            .collect();

        info!(
            "Cancelling {} job(s) of running build {}",
            cancellable.len(),
            running.key
        );

        let attempts = join_all(cancellable.iter().map(|job_key| async move {
            let outcome = self.delete(&format!("/queue/{job_key}")).await;
            (*job_key, outcome)
        }))
        .await;

        let (stopped_jobs, failed_jobs) = attempts.into_iter().fold(
            (Vec::new(), Vec::new()),
            |(mut stopped, mut failed), (job_key, outcome)| {
                match outcome {
                    Ok(_) => stopped.push(job_key.to_owned()),
                    Err(e) => {
                        warn!("Failed to cancel job {job_key}: {e}");
                        failed.push(job_key.to_owned());
                    }
                }
                (stopped, failed)
            },
        );

        Ok(StopOutcome::from_cancellation(Cancellation {
            build_key: running.key.clone(),
            stopped_jobs,
            failed_jobs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bamboo::test_support::client_for;
    use crate::error::BambooError;
    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::json;

    async fn mock_plan(server: &mut ServerGuard, plan_key: &str, is_building: bool) -> Mock {
        server
            .mock("GET", format!("/rest/api/latest/plan/{plan_key}").as_str())
            .with_status(200)
            .with_body(json!({"key": plan_key, "isBuilding": is_building}).to_string())
            .create_async()
            .await
    }

    async fn mock_recent_results(
        server: &mut ServerGuard,
        plan_key: &str,
        results: serde_json::Value,
    ) -> Mock {
        server
            .mock("GET", format!("/rest/api/latest/result/{plan_key}").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("includeAllStates".into(), "true".into()),
                Matcher::UrlEncoded("max-result".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(json!({"results": {"result": results}}).to_string())
            .create_async()
            .await
    }

    async fn mock_build_tree(
        server: &mut ServerGuard,
        build_key: &str,
        stages: serde_json::Value,
    ) -> Mock {
        server
            .mock("GET", format!("/rest/api/latest/result/{build_key}").as_str())
            .match_query(Matcher::UrlEncoded(
                "expand".into(),
                "stages.stage.results.result".into(),
            ))
            .with_status(200)
            .with_body(
                json!({
                    "key": build_key,
                    "lifeCycleState": "InProgress",
                    "stages": {"stage": stages}
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    async fn mock_cancel(server: &mut ServerGuard, job_key: &str, status: usize) -> Mock {
        server
            .mock("DELETE", format!("/rest/api/latest/queue/{job_key}").as_str())
            .with_status(status)
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_not_building_issues_no_cancellation() {
        let mut server = mockito::Server::new_async().await;
        let _plan = mock_plan(&mut server, "WEBAPP-BACK", false).await;
        let cancel = server
            .mock("DELETE", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let listing = server
            .mock("GET", Matcher::Regex("^/rest/api/latest/result/".into()))
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let outcome = client.stop_build("WEBAPP-BACK").await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Plan WEBAPP-BACK is not currently building");
        assert!(outcome.cancellation.is_none());
        cancel.assert_async().await;
        listing.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_in_progress_result() {
        let mut server = mockito::Server::new_async().await;
        let _plan = mock_plan(&mut server, "WEBAPP-BACK", true).await;
        let _recent = mock_recent_results(
            &mut server,
            "WEBAPP-BACK",
            json!([
                {"key": "WEBAPP-BACK-41", "lifeCycleState": "Finished"},
                {"key": "WEBAPP-BACK-42", "lifeCycleState": "Queued"}
            ]),
        )
        .await;

        let client = client_for(&server);
        let outcome = client.stop_build("WEBAPP-BACK").await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message, "No running build found for plan WEBAPP-BACK");
        assert!(outcome.cancellation.is_none());
    }

    #[tokio::test]
    async fn test_stops_running_job_by_job_key() {
        let mut server = mockito::Server::new_async().await;
        let _plan = mock_plan(&mut server, "WEBAPP-BACK", true).await;
        let _recent = mock_recent_results(
            &mut server,
            "WEBAPP-BACK",
            json!([{"key": "WEBAPP-BACK-42", "lifeCycleState": "InProgress"}]),
        )
        .await;
        let _tree = mock_build_tree(
            &mut server,
            "WEBAPP-BACK-42",
            json!([{"name": "Build", "results": {"result": [
                {"key": "WEBAPP-BACK-JOB1-42", "lifeCycleState": "InProgress"}
            ]}}]),
        )
        .await;
        let cancel = mock_cancel(&mut server, "WEBAPP-BACK-JOB1-42", 204).await;
        let plan_level_cancel = server
            .mock("DELETE", "/rest/api/latest/queue/WEBAPP-BACK-42")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let outcome = client.stop_build("WEBAPP-BACK").await.unwrap();

        assert_eq!(
            outcome,
            StopOutcome {
                success: true,
                message: "Stopped 1 job(s) for build WEBAPP-BACK-42".into(),
                cancellation: Some(Cancellation {
                    build_key: "WEBAPP-BACK-42".into(),
                    stopped_jobs: vec!["WEBAPP-BACK-JOB1-42".into()],
                    failed_jobs: vec![],
                }),
            }
        );
        cancel.assert_async().await;
        plan_level_cancel.assert_async().await;
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported_not_raised() {
        let mut server = mockito::Server::new_async().await;
        let _plan = mock_plan(&mut server, "PROJ-PLAN", true).await;
        let _recent = mock_recent_results(
            &mut server,
            "PROJ-PLAN",
            json!([{"key": "PROJ-PLAN-7", "lifeCycleState": "InProgress"}]),
        )
        .await;
        let _tree = mock_build_tree(
            &mut server,
            "PROJ-PLAN-7",
            json!([
                {"name": "Build", "results": {"result": [
                    {"key": "PROJ-PLAN-JOB1-7", "lifeCycleState": "InProgress"},
                    {"key": "PROJ-PLAN-LINT-7", "lifeCycleState": "Finished"}
                ]}},
                {"name": "Test", "results": {"result": [
                    {"key": "PROJ-PLAN-UNIT-7", "lifeCycleState": "Pending"},
                    {"key": "PROJ-PLAN-E2E-7", "lifeCycleState": "Queued"}
                ]}}
            ]),
        )
        .await;
        let job1 = mock_cancel(&mut server, "PROJ-PLAN-JOB1-7", 204).await;
        let unit = mock_cancel(&mut server, "PROJ-PLAN-UNIT-7", 500).await;
        let e2e = mock_cancel(&mut server, "PROJ-PLAN-E2E-7", 204).await;
        let finished = server
            .mock("DELETE", "/rest/api/latest/queue/PROJ-PLAN-LINT-7")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let outcome = client.stop_build("PROJ-PLAN").await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "Stopped 2 job(s) for build PROJ-PLAN-7");
        let cancellation = outcome.cancellation.unwrap();
        assert_eq!(
            cancellation.stopped_jobs,
            vec!["PROJ-PLAN-JOB1-7", "PROJ-PLAN-E2E-7"]
        );
        assert_eq!(cancellation.failed_jobs, vec!["PROJ-PLAN-UNIT-7"]);

        job1.assert_async().await;
        unit.assert_async().await;
        e2e.assert_async().await;
        finished.assert_async().await;
    }

    #[tokio::test]
    async fn test_all_cancellations_failing_is_not_success() {
        let mut server = mockito::Server::new_async().await;
        let _plan = mock_plan(&mut server, "PROJ-PLAN", true).await;
        let _recent = mock_recent_results(
            &mut server,
            "PROJ-PLAN",
            json!([{"key": "PROJ-PLAN-8", "lifeCycleState": "InProgress"}]),
        )
        .await;
        let _tree = mock_build_tree(
            &mut server,
            "PROJ-PLAN-8",
            json!([{"name": "Build", "results": {"result": [
                {"key": "PROJ-PLAN-JOB1-8", "lifeCycleState": "InProgress"}
            ]}}]),
        )
        .await;
        let _cancel = mock_cancel(&mut server, "PROJ-PLAN-JOB1-8", 403).await;

        let client = client_for(&server);
        let outcome = client.stop_build("PROJ-PLAN").await.unwrap();

        assert!(!outcome.success);
        assert_eq!(
            outcome.message,
            "No running jobs found to stop for build PROJ-PLAN-8"
        );
        let cancellation = outcome.cancellation.unwrap();
        assert!(cancellation.stopped_jobs.is_empty());
        assert_eq!(cancellation.failed_jobs, vec!["PROJ-PLAN-JOB1-8"]);
    }

    #[tokio::test]
    async fn test_running_build_without_cancellable_jobs() {
        let mut server = mockito::Server::new_async().await;
        let _plan = mock_plan(&mut server, "PROJ-PLAN", true).await;
        let _recent = mock_recent_results(
            &mut server,
            "PROJ-PLAN",
            json!([{"key": "PROJ-PLAN-9", "lifeCycleState": "InProgress"}]),
        )
        .await;
        let _tree = mock_build_tree(
            &mut server,
            "PROJ-PLAN-9",
            json!([{"name": "Build", "results": {"result": [
                {"key": "PROJ-PLAN-JOB1-9", "lifeCycleState": "Finished"}
            ]}}]),
        )
        .await;

        let client = client_for(&server);
        let outcome = client.stop_build("PROJ-PLAN").await.unwrap();

        assert!(!outcome.success);
        let cancellation = outcome.cancellation.unwrap();
        assert!(cancellation.stopped_jobs.is_empty());
        assert!(cancellation.failed_jobs.is_empty());
    }

    #[tokio::test]
    async fn test_plan_fetch_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/api/latest/plan/MISSING-PLAN")
            .with_status(404)
            .with_body("Plan not found")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.stop_build("MISSING-PLAN").await.unwrap_err();

        assert!(matches!(err, BambooError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_recent_results_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _plan = mock_plan(&mut server, "WEBAPP-BACK", true).await;
        let _recent = server
            .mock("GET", "/rest/api/latest/result/WEBAPP-BACK")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("Internal error")
            .create_async()
            .await;
        let cancel = server
            .mock("DELETE", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.stop_build("WEBAPP-BACK").await.unwrap_err();

        assert!(matches!(err, BambooError::Api { status: 500, .. }));
        cancel.assert_async().await;
    }

    #[tokio::test]
    async fn test_build_tree_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _plan = mock_plan(&mut server, "WEBAPP-BACK", true).await;
        let _recent = mock_recent_results(
            &mut server,
            "WEBAPP-BACK",
            json!([{"key": "WEBAPP-BACK-42", "lifeCycleState": "InProgress"}]),
        )
        .await;
        let _tree = server
            .mock("GET", "/rest/api/latest/result/WEBAPP-BACK-42")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("Service unavailable")
            .create_async()
            .await;
        let cancel = server
            .mock("DELETE", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.stop_build("WEBAPP-BACK").await.unwrap_err();

        assert!(matches!(err, BambooError::Api { status: 503, .. }));
        cancel.assert_async().await;
    }

    #[test]
    fn test_outcome_serialization_shape() {
        let outcome = StopOutcome::nothing_to_do("Plan P is not currently building".into());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": false, "message": "Plan P is not currently building"})
        );

        let outcome = StopOutcome::from_cancellation(Cancellation {
            build_key: "P-1".into(),
            stopped_jobs: vec!["P-J-1".into()],
            failed_jobs: vec![],
        });
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "success": true,
                "message": "Stopped 1 job(s) for build P-1",
                "buildKey": "P-1",
                "stoppedJobs": ["P-J-1"],
                "failedJobs": []
            })
        );
    }
}
