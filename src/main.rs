use calendar_agent::startup;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting calendar agent");

    // Load configuration
    let config = startup::load_config()?;

    // Wire the agent and serve it
    let agent = startup::build_agent(Arc::clone(&config))?;
    startup::start_server(config, agent).await
}
