use serde::{Deserialize, Serialize};

/// Execution status of a build or job result.
///
/// Bamboo reports more states than the ones listed here; anything else
/// decodes as [`LifecycleState::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    Pending,
    Queued,
    InProgress,
    Finished,
    NotBuilt,
    #[default]
    #[serde(other)]
    Unknown,
}

impl LifecycleState {
    /// Only work that has not finished can be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Queued | Self::InProgress)
    }
}

/// `GET /plan/{key}`, reduced to what the stopper needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    #[serde(default)]
    pub is_building: bool,
}

/// `GET /result/{planKey}` listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultList {
    #[serde(default)]
    pub results: Option<ResultPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultPage {
    #[serde(default)]
    pub result: Vec<ResultSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub key: String,
    #[serde(default)]
    pub life_cycle_state: LifecycleState,
}

impl ResultList {
    pub fn summaries(&self) -> &[ResultSummary] {
        self.results
            .as_ref()
            .map(|page| page.result.as_slice())
            .unwrap_or_default()
    }
}

/// A build result expanded with its stage → job tree.
///
/// The same shape is returned for plan-level and job-level keys; only the
/// presence of `logEntries` on a direct fetch tells them apart.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    #[serde(default)]
    pub key: String,
    pub build_state: Option<String>,
    #[serde(default)]
    pub life_cycle_state: LifecycleState,
    pub log_entries: Option<LogEntries>,
    pub log_files: Option<Vec<String>>,
    pub stages: Option<Stages>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stages {
    #[serde(default)]
    pub stage: Vec<Stage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stage {
    pub results: Option<JobResults>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResults {
    #[serde(default)]
    pub result: Vec<JobResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub key: String,
    pub build_state: Option<String>,
    #[serde(default)]
    pub life_cycle_state: LifecycleState,
    pub log_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntries {
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub log_entry: Vec<LogEntry>,
}

/// One line of build output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub unstyled_log: String,
    /// Epoch milliseconds
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub formatted_date: String,
}

impl BuildResult {
    /// Every job of every stage, in stage order.
    pub fn jobs(&self) -> impl Iterator<Item = &JobResult> {
        self.stages
            .iter()
            .flat_map(|stages| stages.stage.iter())
            .filter_map(|stage| stage.results.as_ref())
            .flat_map(|results| results.result.iter())
    }
}
