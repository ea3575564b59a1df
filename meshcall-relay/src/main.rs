use anyhow::{Context, Result};
use clap::Parser;
use meshcall_core::IceServerConfig;
use meshcall_core::utils::{DEFAULT_RELAY_PORT, DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use meshcall_server::{RelayConfig, SignalingService, app};
use std::net::{Ipv4Addr, SocketAddr};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meshcall-relay", version, about = "Signaling relay for mesh video calls")]
struct Args {
    /// Address to listen on.
    #[arg(
        long,
        env = "MESHCALL_BIND",
        default_value_t = SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_RELAY_PORT))
    )]
    bind: SocketAddr,

    /// STUN/TURN urls advertised to clients, comma separated.
    #[arg(
        long,
        env = "MESHCALL_ICE_SERVERS",
        value_delimiter = ',',
        default_values_t = [DEFAULT_STUN_ADDR.to_string(), DEFAULT_STUN_ADDR_2.to_string()]
    )]
    ice_servers: Vec<String>,

    #[arg(long, env = "MESHCALL_TURN_USERNAME")]
    turn_username: Option<String>,

    #[arg(long, env = "MESHCALL_TURN_CREDENTIAL")]
    turn_credential: Option<String>,
}

impl Args {
    fn into_config(self) -> RelayConfig {
        RelayConfig {
            bind_addr: self.bind,
            ice_servers: vec![IceServerConfig {
                urls: self.ice_servers,
                username: self.turn_username,
                credential: self.turn_credential,
            }],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    let addr = config.bind_addr;
    info!("Initializing signaling relay...");

    let signaling = SignalingService::new(config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let router = app(signaling).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Signaling relay listening on http://{}", addr);

    axum::serve(listener, router)
        .await
        .context("Relay server stopped")?;
    Ok(())
}
