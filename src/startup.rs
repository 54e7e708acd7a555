use crate::components::CalendarAgent;
use crate::config::Config;
use crate::error::Error;
use reqwest::Client;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and validate the application config
pub fn load_config() -> miette::Result<Arc<Config>> {
    match Config::load() {
        Ok(config) => {
            info!(
                "Using model {} at {}, timezone {}, locale {}",
                config.llm_model, config.llm_base_url, config.timezone, config.locale
            );
            Ok(Arc::new(config))
        }
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Build the agent with its language model and calendar collaborators
pub fn build_agent(config: Arc<Config>) -> miette::Result<Arc<CalendarAgent>> {
    let client = Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;

    let agent = CalendarAgent::from_config(config, client)?;
    Ok(Arc::new(agent))
}

/// Serve the agent over HTTP until a shutdown signal arrives
#[cfg(feature = "web-interface")]
pub async fn start_server(config: Arc<Config>, agent: Arc<CalendarAgent>) -> miette::Result<()> {
    use crate::server::{router, AppState};

    let state = AppState {
        agent,
        request_timeout: config.request_timeout(),
        model: config.llm_model.clone(),
    };
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(Error::from)?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::shutdown::wait_for_signal())
        .await
        .map_err(Error::from)?;

    info!("Server stopped");
    Ok(())
}

/// Without the web interface there is nothing to serve
#[cfg(not(feature = "web-interface"))]
pub async fn start_server(_config: Arc<Config>, _agent: Arc<CalendarAgent>) -> miette::Result<()> {
    println!("Web interface feature not enabled. Please compile with --features web-interface");
    Ok(())
}
