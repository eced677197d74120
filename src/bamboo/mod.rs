mod client;
mod logs;
mod stop;
mod types;

pub use client::{
    BambooClient, BuildResultFilter, BuildTrigger, DeploymentResultOptions, Page,
};
pub use stop::StopOutcome;
