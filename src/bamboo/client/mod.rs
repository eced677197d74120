mod core;
mod endpoints;

pub use self::core::{BambooClient, Query};
pub use self::endpoints::{BuildResultFilter, BuildTrigger, DeploymentResultOptions, Page};
