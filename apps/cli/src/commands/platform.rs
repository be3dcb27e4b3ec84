//! Platform handles for the stage commands.

use tabpipe_platform::{EndpointSummary, HttpPlatform, InMemoryPlatform};
use tabpipe_training::PipelineConfig;

/// Endpoint the dry-run platform starts with, so `evaluate --dry-run` has a target.
pub const DRY_RUN_ENDPOINT: &str = "tabpipe-dry-run-endpoint";

/// REST client for the configured gateway, with the bearer token read from
/// the configured environment variable.
pub fn gateway(config: &PipelineConfig) -> HttpPlatform {
    HttpPlatform::from_env(config.platform.base_url.clone(), &config.platform.token_env)
}

/// In-process platform: jobs complete on the first poll and invocations
/// answer with uniform probabilities.
pub fn dry_run() -> InMemoryPlatform {
    InMemoryPlatform::new().with_bucket("tabpipe-dry-run").with_endpoints(vec![EndpointSummary {
        name: DRY_RUN_ENDPOINT.to_string(),
        status: Some("InService".to_string()),
        created_at: None,
    }])
}
