use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use super::client::{BambooClient, Query};
use super::types::{BuildResult, JobResult, LifecycleState, LogEntry};
use crate::config::DEFAULT_MAX_LOG_LINES;
use crate::error::Result;

const LOG_FILES_AVAILABLE: &str =
    "Log files are available via the URLs below. These require browser authentication to download.";
const NO_LOG_FILES: &str = "No log files found for this build.";

/// Log output for a build key of either level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogView {
    /// The key named a job; the fetched result is returned untouched.
    Job(Value),
    /// The key named a plan build; logs of every job were collected.
    Plan(AggregatedLogs),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedLogs {
    pub key: String,
    pub build_state: Option<String>,
    pub life_cycle_state: LifecycleState,
    pub is_job_result: bool,
    pub jobs: Vec<JobLogs>,
    pub total_log_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogs {
    pub job_key: String,
    /// Display hint only; derived from the key and not always accurate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    pub build_state: Option<String>,
    pub log_entries: JobLogEntries,
    /// Set when this job's logs could not be fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobLogEntries {
    pub size: usize,
    pub logs: Vec<LogLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    pub date: String,
    pub log: String,
}

impl From<&LogEntry> for LogLine {
    fn from(entry: &LogEntry) -> Self {
        let date = if !entry.formatted_date.is_empty() {
            entry.formatted_date.clone()
        } else if entry.date != 0 {
            DateTime::<Utc>::from_timestamp_millis(entry.date)
                .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_default()
        } else {
            String::new()
        };

        Self {
            date,
            log: entry.unstyled_log.clone(),
        }
    }
}

/// Download links for build logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogLocationView {
    Job(JobLogFiles),
    Plan(PlanLogFiles),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogFiles {
    pub build_key: String,
    pub log_files: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLogFiles {
    pub build_key: String,
    pub jobs: Vec<JobLogFileSet>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogFileSet {
    pub job_key: String,
    pub log_files: Vec<String>,
}

/// What a direct fetch of a result key turned out to be.
enum ResultProbe {
    Job(Value),
    Plan(BuildResult),
}

impl ResultProbe {
    /// Job results carry their log entries on a direct fetch; plan results don't.
    fn classify(value: Value) -> Result<Self> {
        let has_entries = value
            .pointer("/logEntries/logEntry")
            .and_then(Value::as_array)
            .is_some_and(|entries| !entries.is_empty());

        if has_entries {
            Ok(Self::Job(value))
        } else {
            Ok(Self::Plan(serde_json::from_value(value)?))
        }
    }
}

/// Second-to-last hyphen segment: `PROJ-PLAN-JOB1-42` → `JOB1`.
pub fn job_name_from_key(job_key: &str) -> Option<String> {
    job_key.rsplit('-').nth(1).map(str::to_owned)
}

/// Splice a job key into a plan result key: (`PROJ-PLAN-42`, `JOB1`) → `PROJ-PLAN-JOB1-42`.
pub fn job_result_key(build_key: &str, job_key: &str) -> String {
    let build_number = build_key.rsplit('-').next().unwrap_or(build_key);
    let plan_part = match build_key.rsplit_once('-') {
        Some((head, tail)) if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => {
            head
        }
        _ => build_key,
    };
    format!("{plan_part}-{job_key}-{build_number}")
}

fn effective_max_lines(max_lines: Option<usize>) -> usize {
    max_lines
        .filter(|lines| *lines > 0)
        .unwrap_or(DEFAULT_MAX_LOG_LINES)
}

fn location_message(found: bool) -> String {
    let message = if found { LOG_FILES_AVAILABLE } else { NO_LOG_FILES };
    message.to_string()
}

impl BambooClient {
    /// Fetch log content for a plan-level or job-level result key.
    ///
    /// The key is probed once with both log entries and the stage tree
    /// expanded. A populated `logEntries` means the key named a job and the
    /// result is passed through. Otherwise every job of every stage is
    /// fetched and the logs are aggregated.
    ///
    /// A job whose logs fail to load is still listed, with an `error` and no
    /// entries; only the initial probe can fail the whole call.
    pub async fn get_build_result_with_logs(
        &self,
        build_key: &str,
        max_lines: Option<usize>,
    ) -> Result<LogView> {
        let max_lines = effective_max_lines(max_lines);

        let probe = self
            .get(
                &format!("/result/{build_key}"),
                &Query::new()
                    .set("expand", "logEntries,stages.stage.results.result")
                    .set("max-result", max_lines),
            )
            .await?;

        let plan = match ResultProbe::classify(probe)? {
            ResultProbe::Job(raw) => {
                debug!("{build_key} is a job result, returning its log entries");
                return Ok(LogView::Job(raw));
            }
            ResultProbe::Plan(plan) => plan,
        };

        let job_fetches = plan.jobs().map(|job| self.fetch_job_logs(job, max_lines));
        let jobs = join_all(job_fetches).await;

        let total_log_entries: usize = jobs.iter().map(|job| job.log_entries.size).sum();
        info!(
            "Collected {total_log_entries} log entries from {} job(s) of {build_key}",
            jobs.len()
        );

        Ok(LogView::Plan(AggregatedLogs {
            key: plan.key,
            build_state: plan.build_state,
            life_cycle_state: plan.life_cycle_state,
            is_job_result: false,
            jobs,
            total_log_entries,
        }))
    }

    async fn fetch_job_logs(&self, job: &JobResult, max_lines: usize) -> JobLogs {
        let fetched: Result<BuildResult> = self
            .get_as(
                &format!("/result/{}", job.key),
                &Query::new()
                    .set("expand", "logEntries")
                    .set("max-result", max_lines),
            )
            .await;

        let job_name = job_name_from_key(&job.key);

        match fetched {
            Ok(result) => {
                let log_entries = result
                    .log_entries
                    .map(|entries| JobLogEntries {
                        size: entries.size,
                        logs: entries.log_entry.iter().map(LogLine::from).collect(),
                    })
                    .unwrap_or_default();

                JobLogs {
                    job_key: job.key.clone(),
                    job_name,
                    build_state: result.build_state,
                    log_entries,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Failed to fetch logs for job {}: {e}", job.key);
                JobLogs {
                    job_key: job.key.clone(),
                    job_name,
                    build_state: job.build_state.clone(),
                    log_entries: JobLogEntries::default(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// List log file URLs for a build, without their content.
    ///
    /// With `job_key` the job result key is built directly and no probing is
    /// needed; without it every job with log files in the plan result is listed.
    pub async fn get_build_log_files(
        &self,
        build_key: &str,
        job_key: Option<&str>,
    ) -> Result<LogLocationView> {
        if let Some(job_key) = job_key {
            let job_result_key = job_result_key(build_key, job_key);
            let result: BuildResult = self
                .get_as(
                    &format!("/result/{job_result_key}"),
                    &Query::new().set("expand", "logFiles"),
                )
                .await?;

            let log_files = result.log_files.unwrap_or_default();
            return Ok(LogLocationView::Job(JobLogFiles {
                build_key: job_result_key,
                message: location_message(!log_files.is_empty()),
                log_files,
            }));
        }

        let result: BuildResult = self
            .get_as(
                &format!("/result/{build_key}"),
                &Query::new().set("expand", "stages.stage.results.result"),
            )
            .await?;

        let jobs: Vec<JobLogFileSet> = result
            .jobs()
            .filter_map(|job| {
                let files = job.log_files.as_ref().filter(|files| !files.is_empty())?;
                Some(JobLogFileSet {
                    job_key: job.key.clone(),
                    log_files: files.clone(),
                })
            })
            .collect();

        Ok(LogLocationView::Plan(PlanLogFiles {
            build_key: build_key.to_owned(),
            message: location_message(!jobs.is_empty()),
            jobs,
        }))
    }
}
