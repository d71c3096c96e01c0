//! depot-server: the HTTP binary wiring every subsystem together (§6).

use clap::Parser;
use depot_api::{AppState, DepotConfig};
use depot_server::config::CliArgs;
use depot_server::error::{exit_code_for, EXIT_GENERIC_ERROR};
use depot_server::ServerConfig;
use model_loader::AdapterRegistry;
use tracing::info;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    common::logging::init(&args.log_level);

    if let Err(err) = run(args).await {
        match err.downcast_ref::<depot_values::DepotError>() {
            Some(depot_err) => {
                tracing::error!(error = %depot_err, "server exiting");
                std::process::exit(exit_code_for(depot_err));
            }
            None => {
                tracing::error!(error = %err, "server exiting");
                std::process::exit(EXIT_GENERIC_ERROR);
            }
        }
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let port = args.port;
    let server_config = ServerConfig::load(&args)?;
    common::platform::ensure_dir(&server_config.models_directory)?;

    info!(
        port,
        models_directory = %server_config.models_directory.display(),
        "starting depot-server"
    );

    let api_config: DepotConfig = server_config.into_api_config();
    // No native Backend adapters are implemented here; a deployment wires its
    // own adapters through `AdapterRegistry::register` before serving.
    let registry = AdapterRegistry::new();
    let state = AppState::new(api_config, registry);

    let router = depot_api::build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("listening on 0.0.0.0:{port}");
    axum::serve(listener, router).await?;

    Ok(())
}
