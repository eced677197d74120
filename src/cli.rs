use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::bamboo::BambooClient;
use crate::config::Config;
use crate::mcp::{self, BambooServer};
use crate::output;

#[derive(Parser)]
#[command(name = "bamboo-mcp")]
#[command(author, version, about = "Bamboo CI tools for agent clients", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Bamboo base URL (e.g., https://bamboo.example.com)
    #[arg(long, global = true, env = "BAMBOO_URL")]
    url: Option<String>,

    /// Personal access token
    #[arg(long, global = true, env = "BAMBOO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// HTTP(S) proxy for all Bamboo requests
    #[arg(long, global = true, env = "BAMBOO_PROXY")]
    proxy: Option<String>,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the tool server on stdio (default)
    Serve,

    /// Stop the running build of a plan
    StopBuild {
        /// Plan key (e.g., PROJ-PLAN)
        plan_key: String,
    },

    /// Fetch log content for a plan or job result
    Logs {
        /// Result key (e.g., PROJ-PLAN-123 or PROJ-PLAN-JOB1-123)
        build_key: String,

        #[arg(short = 'n', long)]
        max_lines: Option<usize>,
    },

    /// List log file URLs for a build
    LogFiles {
        build_key: String,

        #[arg(short, long)]
        job: Option<String>,
    },
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        config.apply_overrides(
            self.url.as_deref(),
            self.token.as_deref(),
            self.proxy.as_deref(),
        );
        Ok(config)
    }

    fn emit<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        output::emit_json(value, self.pretty, self.output.as_deref())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = BambooClient::new(&config.connection()?)?;
        info!("Using Bamboo API at {}", client.api_root());

        match self.command.as_ref().unwrap_or(&Commands::Serve) {
            Commands::Serve => {
                let server = BambooServer::new(client, config.logs.max_lines);
                mcp::serve_stdio(server).await
            }
            Commands::StopBuild { plan_key } => {
                info!("Stopping running build of {plan_key}");
                let outcome = client.stop_build(plan_key).await?;
                output::print_stop_summary(&outcome);
                self.emit(&outcome)
            }
            Commands::Logs {
                build_key,
                max_lines,
            } => {
                info!("Fetching logs for {build_key}");
                let max_lines = max_lines.or(Some(config.logs.max_lines));
                let logs = client.get_build_result_with_logs(build_key, max_lines).await?;
                self.emit(&logs)
            }
            Commands::LogFiles { build_key, job } => {
                let files = client
                    .get_build_log_files(build_key, job.as_deref())
                    .await?;
                self.emit(&files)
            }
        }
    }
}
