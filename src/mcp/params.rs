use std::collections::BTreeMap;

use rmcp::schemars;
use serde::Deserialize;

use crate::bamboo::Page;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListParams {
    #[schemars(description = "Fields to expand in the response (e.g., \"projects.project.plans\")")]
    pub expand: Option<String>,
    #[schemars(description = "Starting index for pagination (default: 0)")]
    pub start_index: Option<u32>,
    #[schemars(description = "Maximum number of results to return (default: 25)")]
    pub max_results: Option<u32>,
}

impl ListParams {
    pub fn page(&self) -> Page {
        Page {
            start_index: self.start_index,
            max_results: self.max_results,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProjectParams {
    #[schemars(description = "The project key (e.g., \"PROJ\")")]
    pub project_key: String,
    #[schemars(description = "Fields to expand in the response")]
    pub expand: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PlanParams {
    #[schemars(description = "The plan key (e.g., \"PROJ-PLAN\")")]
    pub plan_key: String,
    #[schemars(description = "Fields to expand in the response")]
    pub expand: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PlanKeyParams {
    #[schemars(description = "The plan key (e.g., \"PROJ-PLAN\")")]
    pub plan_key: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchPlansParams {
    #[schemars(description = "The plan name to search for")]
    pub name: String,
    #[schemars(description = "Enable fuzzy matching (default: true)")]
    pub fuzzy: Option<bool>,
    #[schemars(description = "Starting index for pagination (default: 0)")]
    pub start_index: Option<u32>,
    #[schemars(description = "Maximum number of results to return (default: 25)")]
    pub max_results: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListBranchesParams {
    #[schemars(description = "The plan key (e.g., \"PROJ-PLAN\")")]
    pub plan_key: String,
    #[schemars(description = "Only return enabled branches")]
    pub enabled_only: Option<bool>,
    #[schemars(description = "Starting index for pagination (default: 0)")]
    pub start_index: Option<u32>,
    #[schemars(description = "Maximum number of results to return (default: 25)")]
    pub max_results: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BranchParams {
    #[schemars(description = "The plan key (e.g., \"PROJ-PLAN\")")]
    pub plan_key: String,
    #[schemars(description = "The branch name")]
    pub branch_name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TriggerBuildParams {
    #[schemars(description = "The plan key to build (e.g., \"PROJ-PLAN\")")]
    pub plan_key: String,
    #[schemars(description = "Specific stage to execute")]
    pub stage: Option<String>,
    #[schemars(description = "Execute all stages (default: true)")]
    pub execute_all_stages: Option<bool>,
    #[schemars(description = "Custom VCS revision to build")]
    pub custom_revision: Option<String>,
    #[schemars(description = "Bamboo variables to pass to the build (key-value pairs)")]
    pub variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BuildResultParams {
    #[schemars(description = "The build result key (e.g., \"PROJ-PLAN-123\")")]
    pub build_key: String,
    #[schemars(description = "Fields to expand (e.g., \"changes,artifacts,testResults\")")]
    pub expand: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LatestResultParams {
    #[schemars(description = "The plan key (e.g., \"PROJ-PLAN\")")]
    pub plan_key: String,
    #[schemars(description = "Fields to expand (e.g., \"changes,artifacts,testResults\")")]
    pub expand: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListBuildResultsParams {
    #[schemars(description = "Filter by project key")]
    pub project_key: Option<String>,
    #[schemars(description = "Filter by plan key (requires project_key)")]
    pub plan_key: Option<String>,
    #[schemars(description = "Filter by build state (e.g., \"Successful\", \"Failed\")")]
    pub build_state: Option<String>,
    #[schemars(description = "Starting index for pagination (default: 0)")]
    pub start_index: Option<u32>,
    #[schemars(description = "Maximum number of results to return (default: 25)")]
    pub max_results: Option<u32>,
    #[schemars(description = "Fields to expand in the response")]
    pub expand: Option<String>,
    #[schemars(description = "Include all build states including in-progress")]
    pub include_all_states: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BuildLogsParams {
    #[schemars(description = "The build result key (e.g., \"PROJ-PLAN-123\")")]
    pub build_key: String,
    #[schemars(description = "Specific job key to get logs for")]
    pub job_key: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BuildResultLogsParams {
    #[schemars(
        description = "The build result key - can be plan level (e.g., \"PROJ-PLAN-123\") or job level (e.g., \"PROJ-PLAN-JOB1-123\")"
    )]
    pub build_key: String,
    #[schemars(description = "Maximum number of log lines per job (default: 1000)")]
    pub max_log_lines: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueueParams {
    #[schemars(description = "Fields to expand (default: \"queuedBuilds\")")]
    pub expand: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeploymentProjectParams {
    #[schemars(description = "The deployment project ID")]
    pub project_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TriggerDeploymentParams {
    #[schemars(description = "The release version ID to deploy")]
    pub version_id: String,
    #[schemars(description = "The target environment ID")]
    pub environment_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeploymentResultsParams {
    #[schemars(description = "The environment ID")]
    pub environment_id: String,
    #[schemars(description = "Starting index for pagination (default: 0)")]
    pub start_index: Option<u32>,
    #[schemars(description = "Maximum number of results to return (default: 25)")]
    pub max_results: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeploymentResultParams {
    #[schemars(description = "The deployment result ID")]
    pub deployment_result_id: String,
    #[schemars(description = "Include log entries (default: false)")]
    pub include_logs: Option<bool>,
    #[schemars(description = "Maximum number of log lines to return (default: 1000)")]
    pub max_log_lines: Option<usize>,
}
