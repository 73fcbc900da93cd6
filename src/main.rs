use clap::Parser;
use formwright::adapters::api_handler::ApiState;
use formwright::adapters::health_handler::HealthHandler;
use formwright::cli::Cli;
use formwright::config::Settings;
use formwright::persistence::{DataStore, FormRepository, InMemoryFormRepository};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;
    let host = settings.server.host.clone();
    let port = settings.server.port;

    info!("Starting Formwright on {}:{}", host, port);

    let (repository, data_store): (Arc<dyn FormRepository>, Option<DataStore>) =
        if settings.persistence.is_in_memory() {
            warn!("Using in-memory persistence; published forms are lost on exit");
            (Arc::new(InMemoryFormRepository::new()), None)
        } else {
            let data_store = DataStore::new(&settings.persistence).await?;
            if settings.persistence.auto_migrate {
                let result = data_store.migrate().await?;
                info!(
                    "Migrations complete: {} applied, {} already present",
                    result.applied, result.skipped
                );
            }
            (data_store.repository(), Some(data_store))
        };

    let health_handler = Arc::new(HealthHandler::new(repository.clone()));
    let api_state = ApiState::new(repository, settings.navigation.clone());
    let app = formwright::create_app(api_state, health_handler);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    if let Some(data_store) = data_store {
        data_store.close().await;
    }

    Ok(())
}
