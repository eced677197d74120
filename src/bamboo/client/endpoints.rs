use std::collections::BTreeMap;

use log::{debug, warn};
use serde_json::{json, Value};

use super::core::{BambooClient, Query};
use crate::config::DEFAULT_MAX_LOG_LINES;
use crate::error::Result;

const DEPLOYMENT_QUEUE_UNAVAILABLE: &str = "Deployment queue endpoint not available in this Bamboo version. Use bamboo_get_deployment_results to check deployment status for specific environments.";

/// Pagination shared by the listing endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub start_index: Option<u32>,
    pub max_results: Option<u32>,
}

impl Page {
    fn apply(self, query: Query) -> Query {
        query
            .opt("start-index", self.start_index)
            .opt("max-result", self.max_results)
    }
}

/// Options for queueing a plan build.
#[derive(Debug, Clone, Default)]
pub struct BuildTrigger {
    pub stage: Option<String>,
    pub execute_all_stages: Option<bool>,
    pub custom_revision: Option<String>,
    /// Sent as `bamboo.variable.<name>`.
    pub variables: BTreeMap<String, String>,
}

/// Filters for `GET /result`.
///
/// `plan_key` narrows the listing only together with `project_key`.
#[derive(Debug, Clone, Default)]
pub struct BuildResultFilter {
    pub project_key: Option<String>,
    pub plan_key: Option<String>,
    pub build_state: Option<String>,
    pub page: Page,
    pub expand: Option<String>,
    pub include_all_states: Option<bool>,
}

impl BuildResultFilter {
    fn path(&self) -> String {
        match (&self.project_key, &self.plan_key) {
            (Some(project), Some(plan)) => format!("/result/{project}-{plan}"),
            (Some(project), None) => format!("/result/{project}"),
            _ => "/result".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentResultOptions {
    pub include_logs: bool,
    /// Only sent with `include_logs`; zero or absent means 1000.
    pub max_log_lines: Option<usize>,
}

impl BambooClient {
    pub async fn server_info(&self) -> Result<Value> {
        self.get("/info", &Query::new()).await
    }

    pub async fn health_check(&self) -> Result<Value> {
        self.get("/server", &Query::new()).await
    }

    pub async fn list_projects(&self, expand: Option<&str>, page: Page) -> Result<Value> {
        let query = page.apply(Query::new().opt("expand", expand));
        self.get("/project", &query).await
    }

    pub async fn get_project(&self, project_key: &str, expand: Option<&str>) -> Result<Value> {
        self.get(
            &format!("/project/{project_key}"),
            &Query::new().opt("expand", expand),
        )
        .await
    }

    pub async fn list_plans(&self, expand: Option<&str>, page: Page) -> Result<Value> {
        let query = page.apply(Query::new().opt("expand", expand));
        self.get("/plan", &query).await
    }

    pub async fn get_plan(&self, plan_key: &str, expand: Option<&str>) -> Result<Value> {
        self.get(
            &format!("/plan/{plan_key}"),
            &Query::new().opt("expand", expand),
        )
        .await
    }

    pub async fn search_plans(&self, name: &str, fuzzy: Option<bool>, page: Page) -> Result<Value> {
        let query = page.apply(Query::new().set("searchTerm", name).opt("fuzzy", fuzzy));
        self.get("/search/plans", &query).await
    }

    pub async fn enable_plan(&self, plan_key: &str) -> Result<Value> {
        self.post(&format!("/plan/{plan_key}/enable"), &Query::new())
            .await
    }

    /// Disabling is a DELETE on the same resource enabling POSTs to.
    pub async fn disable_plan(&self, plan_key: &str) -> Result<Value> {
        self.delete(&format!("/plan/{plan_key}/enable")).await
    }

    pub async fn list_plan_branches(
        &self,
        plan_key: &str,
        enabled_only: Option<bool>,
        page: Page,
    ) -> Result<Value> {
        let query = page.apply(Query::new().opt("enabledOnly", enabled_only));
        self.get(&format!("/plan/{plan_key}/branch"), &query).await
    }

    pub async fn get_plan_branch(&self, plan_key: &str, branch_name: &str) -> Result<Value> {
        let branch = urlencoding::encode(branch_name);
        self.get(&format!("/plan/{plan_key}/branch/{branch}"), &Query::new())
            .await
    }

    pub async fn trigger_build(&self, plan_key: &str, trigger: &BuildTrigger) -> Result<Value> {
        let mut query = Query::new()
            .opt("stage", trigger.stage.as_deref())
            .opt("executeAllStages", trigger.execute_all_stages)
            .opt("customRevision", trigger.custom_revision.as_deref());
        for (name, value) in &trigger.variables {
            query = query.set(format!("bamboo.variable.{name}"), value);
        }

        debug!("Queueing build for {plan_key}");
        self.post(&format!("/queue/{plan_key}"), &query).await
    }

    pub async fn get_build_result(&self, build_key: &str, expand: Option<&str>) -> Result<Value> {
        self.get(
            &format!("/result/{build_key}"),
            &Query::new().opt("expand", expand),
        )
        .await
    }

    pub async fn get_latest_result(&self, plan_key: &str, expand: Option<&str>) -> Result<Value> {
        self.get(
            &format!("/result/{plan_key}/latest"),
            &Query::new().opt("expand", expand),
        )
        .await
    }

    pub async fn list_build_results(&self, filter: &BuildResultFilter) -> Result<Value> {
        let query = Query::new().opt("buildstate", filter.build_state.as_deref());
        let query = filter
            .page
            .apply(query)
            .opt("expand", filter.expand.as_deref())
            .opt("includeAllStates", filter.include_all_states);

        self.get(&filter.path(), &query).await
    }

    pub async fn get_build_queue(&self, expand: Option<&str>) -> Result<Value> {
        let expand = expand.filter(|e| !e.is_empty()).unwrap_or("queuedBuilds");
        self.get("/queue", &Query::new().set("expand", expand))
            .await
    }

    /// Not every Bamboo version serves the deployment queue; any failure is
    /// reported as an `available: false` payload instead of an error.
    pub async fn get_deployment_queue(&self) -> Value {
        match self
            .get(
                "/deploy/queue",
                &Query::new().set("expand", "queuedDeployments"),
            )
            .await
        {
            Ok(queue) => queue,
            Err(e) => {
                warn!("Deployment queue unavailable: {e}");
                json!({
                    "message": DEPLOYMENT_QUEUE_UNAVAILABLE,
                    "available": false,
                })
            }
        }
    }

    pub async fn list_deployment_projects(&self) -> Result<Value> {
        self.get("/deploy/project/all", &Query::new()).await
    }

    pub async fn get_deployment_project(&self, project_id: &str) -> Result<Value> {
        self.get(&format!("/deploy/project/{project_id}"), &Query::new())
            .await
    }

    pub async fn trigger_deployment(&self, version_id: &str, environment_id: &str) -> Result<Value> {
        let query = Query::new()
            .set("versionId", version_id)
            .set("environmentId", environment_id);
        self.post("/queue/deployment", &query).await
    }

    pub async fn get_deployment_results(&self, environment_id: &str, page: Page) -> Result<Value> {
        self.get(
            &format!("/deploy/environment/{environment_id}/results"),
            &page.apply(Query::new()),
        )
        .await
    }

    pub async fn get_deployment_result(
        &self,
        result_id: &str,
        options: DeploymentResultOptions,
    ) -> Result<Value> {
        let query = if options.include_logs {
            let max_lines = options
                .max_log_lines
                .filter(|lines| *lines > 0)
                .unwrap_or(DEFAULT_MAX_LOG_LINES);
            Query::new()
                .set("includeLogs", true)
                .set("max-result", max_lines)
        } else {
            Query::new()
        };

        self.get(&format!("/deploy/result/{result_id}"), &query)
            .await
    }
}
