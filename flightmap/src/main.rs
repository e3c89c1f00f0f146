use std::{error::Error, net::SocketAddr};

use chrono::Utc;
use clap::{Parser, Subcommand};
use flightmap::{
    AppState, MapStateResponse, TrajectoryResponse, config::Config, create_router,
    error::{validate_airline_code, validate_flight_number},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Headless crisis map: flight routes and trajectories over the operations backend"
)]
struct Cli {
    /// Backend base URL, overrides CRISIS_API_ROOT
    #[arg(long, global = true)]
    api_root: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the map state over HTTP
    Serve {
        /// Listen address, overrides FLIGHTMAP_BIND
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Load an airline's flights and print the resulting map
    Flights {
        #[arg(long)]
        airline: String,
    },
    /// Load or synthesize one flight's trajectory and print it with the map
    Trajectory {
        #[arg(long)]
        flight: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flightmap=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(root) = cli.api_root {
        config = config.with_api_root(root);
    }
    tracing::info!("using crisis backend at {}", config.api_root);

    let state = AppState::from_config(&config)?;

    match cli.command {
        Command::Serve { bind } => {
            let addr = bind.unwrap_or(config.bind_addr);
            let app = create_router(state);
            tracing::info!("starting flightmap on http://{addr}");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Command::Flights { airline } => {
            let airline = validate_airline_code(&airline)?;
            state.view.load_airline(&airline).await;
            let map = MapStateResponse::capture(&state.view);
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        Command::Trajectory { flight } => {
            let flight = validate_flight_number(&flight)?;
            let (trajectory, _) = state.view.load_flight(&flight, Utc::now()).await;
            let response = TrajectoryResponse {
                trajectory,
                map: MapStateResponse::capture(&state.view),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
