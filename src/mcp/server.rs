use log::warn;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData, ServerHandler,
};
use serde::Serialize;

use super::params::{
    BranchParams, BuildLogsParams, BuildResultLogsParams, BuildResultParams,
    DeploymentProjectParams, DeploymentResultParams, DeploymentResultsParams, LatestResultParams,
    ListBranchesParams, ListBuildResultsParams, ListParams, PlanKeyParams, PlanParams,
    ProjectParams, QueueParams, SearchPlansParams, TriggerBuildParams, TriggerDeploymentParams,
};
use crate::bamboo::{
    BambooClient, BuildResultFilter, BuildTrigger, DeploymentResultOptions, Page,
};
use crate::error::BambooError;

type ToolResult = std::result::Result<CallToolResult, ErrorData>;

/// Tool server exposing one Bamboo instance to an agent client.
///
/// Tool failures are reported in-band as `Error: <message>` results with
/// `is_error` set; the protocol-level error is never used.
#[derive(Clone)]
pub struct BambooServer {
    client: BambooClient,
    default_max_log_lines: usize,
    tool_router: ToolRouter<Self>,
}

impl BambooServer {
    pub fn new(client: BambooClient, default_max_log_lines: usize) -> Self {
        Self {
            client,
            default_max_log_lines,
            tool_router: Self::tool_router(),
        }
    }
}

fn json_response<T: Serialize>(data: &T) -> ToolResult {
    match serde_json::to_string_pretty(data) {
        Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
        Err(e) => error_response(&BambooError::from(e)),
    }
}

fn text_response(message: String) -> ToolResult {
    Ok(CallToolResult::success(vec![Content::text(message)]))
}

fn error_response(err: &BambooError) -> ToolResult {
    warn!("Tool call failed: {err}");
    Ok(CallToolResult::error(vec![Content::text(format!(
        "Error: {err}"
    ))]))
}

fn respond<T: Serialize>(result: crate::error::Result<T>) -> ToolResult {
    match result {
        Ok(data) => json_response(&data),
        Err(e) => error_response(&e),
    }
}

#[tool_router]
impl BambooServer {
    #[tool(
        name = "bamboo_server_info",
        description = "Get Bamboo server information including version and state"
    )]
    async fn server_info(&self) -> ToolResult {
        respond(self.client.server_info().await)
    }

    #[tool(
        name = "bamboo_health_check",
        description = "Check Bamboo server health status"
    )]
    async fn health_check(&self) -> ToolResult {
        respond(self.client.health_check().await)
    }

    #[tool(name = "bamboo_list_projects", description = "List all Bamboo projects")]
    async fn list_projects(&self, Parameters(params): Parameters<ListParams>) -> ToolResult {
        respond(
            self.client
                .list_projects(params.expand.as_deref(), params.page())
                .await,
        )
    }

    #[tool(
        name = "bamboo_get_project",
        description = "Get details of a specific Bamboo project"
    )]
    async fn get_project(
        &self,
        Parameters(ProjectParams {
            project_key,
            expand,
        }): Parameters<ProjectParams>,
    ) -> ToolResult {
        respond(
            self.client
                .get_project(&project_key, expand.as_deref())
                .await,
        )
    }

    #[tool(name = "bamboo_list_plans", description = "List all Bamboo build plans")]
    async fn list_plans(&self, Parameters(params): Parameters<ListParams>) -> ToolResult {
        respond(
            self.client
                .list_plans(params.expand.as_deref(), params.page())
                .await,
        )
    }

    #[tool(
        name = "bamboo_get_plan",
        description = "Get details of a specific Bamboo build plan"
    )]
    async fn get_plan(
        &self,
        Parameters(PlanParams { plan_key, expand }): Parameters<PlanParams>,
    ) -> ToolResult {
        respond(self.client.get_plan(&plan_key, expand.as_deref()).await)
    }

    #[tool(name = "bamboo_search_plans", description = "Search for Bamboo plans by name")]
    async fn search_plans(
        &self,
        Parameters(SearchPlansParams {
            name,
            fuzzy,
            start_index,
            max_results,
        }): Parameters<SearchPlansParams>,
    ) -> ToolResult {
        let page = Page {
            start_index,
            max_results,
        };
        respond(self.client.search_plans(&name, fuzzy, page).await)
    }

    #[tool(name = "bamboo_enable_plan", description = "Enable a Bamboo build plan")]
    async fn enable_plan(
        &self,
        Parameters(PlanKeyParams { plan_key }): Parameters<PlanKeyParams>,
    ) -> ToolResult {
        match self.client.enable_plan(&plan_key).await {
            Ok(_) => text_response(format!("Plan {plan_key} has been enabled successfully.")),
            Err(e) => error_response(&e),
        }
    }

    #[tool(name = "bamboo_disable_plan", description = "Disable a Bamboo build plan")]
    async fn disable_plan(
        &self,
        Parameters(PlanKeyParams { plan_key }): Parameters<PlanKeyParams>,
    ) -> ToolResult {
        match self.client.disable_plan(&plan_key).await {
            Ok(_) => text_response(format!("Plan {plan_key} has been disabled successfully.")),
            Err(e) => error_response(&e),
        }
    }

    #[tool(
        name = "bamboo_list_plan_branches",
        description = "List branches for a Bamboo build plan"
    )]
    async fn list_plan_branches(
        &self,
        Parameters(ListBranchesParams {
            plan_key,
            enabled_only,
            start_index,
            max_results,
        }): Parameters<ListBranchesParams>,
    ) -> ToolResult {
        let page = Page {
            start_index,
            max_results,
        };
        respond(
            self.client
                .list_plan_branches(&plan_key, enabled_only, page)
                .await,
        )
    }

    #[tool(
        name = "bamboo_get_plan_branch",
        description = "Get details of a specific plan branch"
    )]
    async fn get_plan_branch(
        &self,
        Parameters(BranchParams {
            plan_key,
            branch_name,
        }): Parameters<BranchParams>,
    ) -> ToolResult {
        respond(self.client.get_plan_branch(&plan_key, &branch_name).await)
    }

    #[tool(name = "bamboo_trigger_build", description = "Trigger a build for a Bamboo plan")]
    async fn trigger_build(
        &self,
        Parameters(TriggerBuildParams {
            plan_key,
            stage,
            execute_all_stages,
            custom_revision,
            variables,
        }): Parameters<TriggerBuildParams>,
    ) -> ToolResult {
        let trigger = BuildTrigger {
            stage,
            execute_all_stages,
            custom_revision,
            variables: variables.unwrap_or_default(),
        };
        respond(self.client.trigger_build(&plan_key, &trigger).await)
    }

    #[tool(
        name = "bamboo_stop_build",
        description = "Stop a running build by cancelling its in-flight jobs"
    )]
    async fn stop_build(
        &self,
        Parameters(PlanKeyParams { plan_key }): Parameters<PlanKeyParams>,
    ) -> ToolResult {
        respond(self.client.stop_build(&plan_key).await)
    }

    #[tool(
        name = "bamboo_get_build_result",
        description = "Get the result of a specific build"
    )]
    async fn get_build_result(
        &self,
        Parameters(BuildResultParams { build_key, expand }): Parameters<BuildResultParams>,
    ) -> ToolResult {
        respond(
            self.client
                .get_build_result(&build_key, expand.as_deref())
                .await,
        )
    }

    #[tool(
        name = "bamboo_get_latest_result",
        description = "Get the latest build result for a plan"
    )]
    async fn get_latest_result(
        &self,
        Parameters(LatestResultParams { plan_key, expand }): Parameters<LatestResultParams>,
    ) -> ToolResult {
        respond(
            self.client
                .get_latest_result(&plan_key, expand.as_deref())
                .await,
        )
    }

    #[tool(
        name = "bamboo_list_build_results",
        description = "List build results with optional filtering"
    )]
    async fn list_build_results(
        &self,
        Parameters(params): Parameters<ListBuildResultsParams>,
    ) -> ToolResult {
        let filter = BuildResultFilter {
            project_key: params.project_key,
            plan_key: params.plan_key,
            build_state: params.build_state,
            page: Page {
                start_index: params.start_index,
                max_results: params.max_results,
            },
            expand: params.expand,
            include_all_states: params.include_all_states,
        };
        respond(self.client.list_build_results(&filter).await)
    }

    #[tool(
        name = "bamboo_get_build_logs",
        description = "Get log file URLs for a build. For plan builds, lists every job with log files."
    )]
    async fn get_build_logs(
        &self,
        Parameters(BuildLogsParams { build_key, job_key }): Parameters<BuildLogsParams>,
    ) -> ToolResult {
        respond(
            self.client
                .get_build_log_files(&build_key, job_key.as_deref())
                .await,
        )
    }

    #[tool(
        name = "bamboo_get_build_result_logs",
        description = "Get build result with actual log content. For plan builds, fetches logs from all jobs. For job builds, returns logs directly."
    )]
    async fn get_build_result_logs(
        &self,
        Parameters(BuildResultLogsParams {
            build_key,
            max_log_lines,
        }): Parameters<BuildResultLogsParams>,
    ) -> ToolResult {
        let max_lines = max_log_lines.or(Some(self.default_max_log_lines));
        respond(
            self.client
                .get_build_result_with_logs(&build_key, max_lines)
                .await,
        )
    }

    #[tool(
        name = "bamboo_get_build_queue",
        description = "Get the current build queue"
    )]
    async fn get_build_queue(
        &self,
        Parameters(QueueParams { expand }): Parameters<QueueParams>,
    ) -> ToolResult {
        respond(self.client.get_build_queue(expand.as_deref()).await)
    }

    #[tool(
        name = "bamboo_get_deployment_queue",
        description = "Get the current deployment queue"
    )]
    async fn get_deployment_queue(&self) -> ToolResult {
        json_response(&self.client.get_deployment_queue().await)
    }

    #[tool(
        name = "bamboo_list_deployment_projects",
        description = "List all deployment projects"
    )]
    async fn list_deployment_projects(&self) -> ToolResult {
        respond(self.client.list_deployment_projects().await)
    }

    #[tool(
        name = "bamboo_get_deployment_project",
        description = "Get details of a specific deployment project"
    )]
    async fn get_deployment_project(
        &self,
        Parameters(DeploymentProjectParams { project_id }): Parameters<DeploymentProjectParams>,
    ) -> ToolResult {
        respond(self.client.get_deployment_project(&project_id).await)
    }

    #[tool(
        name = "bamboo_trigger_deployment",
        description = "Trigger a deployment of a release version to an environment"
    )]
    async fn trigger_deployment(
        &self,
        Parameters(TriggerDeploymentParams {
            version_id,
            environment_id,
        }): Parameters<TriggerDeploymentParams>,
    ) -> ToolResult {
        respond(
            self.client
                .trigger_deployment(&version_id, &environment_id)
                .await,
        )
    }

    #[tool(
        name = "bamboo_get_deployment_results",
        description = "Get deployment results for an environment"
    )]
    async fn get_deployment_results(
        &self,
        Parameters(DeploymentResultsParams {
            environment_id,
            start_index,
            max_results,
        }): Parameters<DeploymentResultsParams>,
    ) -> ToolResult {
        let page = Page {
            start_index,
            max_results,
        };
        respond(
            self.client
                .get_deployment_results(&environment_id, page)
                .await,
        )
    }

    #[tool(
        name = "bamboo_get_deployment_result",
        description = "Get a specific deployment result with optional logs"
    )]
    async fn get_deployment_result(
        &self,
        Parameters(DeploymentResultParams {
            deployment_result_id,
            include_logs,
            max_log_lines,
        }): Parameters<DeploymentResultParams>,
    ) -> ToolResult {
        let options = DeploymentResultOptions {
            include_logs: include_logs.unwrap_or(false),
            max_log_lines,
        };
        respond(
            self.client
                .get_deployment_result(&deployment_result_id, options)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for BambooServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Implementation::from_build_env()
            },
            instructions: Some(
                "Tools for a Bamboo CI server: plans, builds, logs, queues and deployments. \
                 Use bamboo_get_build_result_logs to read log content and bamboo_stop_build \
                 to cancel a running build."
                    .into(),
            ),
            ..Default::default()
        }
    }
}
