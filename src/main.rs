use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use settlement::adapter::{self, DarajaGateway, GatewayConfig};
use settlement::port::PaymentGateway;
use settlement::service::boot;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "settlement",
    version,
    about = "Payment and refund reconciliation service",
    long_about = None
)]
struct Cli {
    /// Address to serve the HTTP API on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    #[command(flatten)]
    gateway: GatewayArgs,
}

/// Gateway credentials and endpoints, taken from the environment and turned
/// into an explicit config injected into the gateway adapter.
#[derive(clap::Args, Debug)]
struct GatewayArgs {
    #[arg(long, env = "MPESA_CONSUMER_KEY", hide_env_values = true)]
    mpesa_consumer_key: String,

    #[arg(long, env = "MPESA_CONSUMER_SECRET", hide_env_values = true)]
    mpesa_consumer_secret: String,

    #[arg(long, env = "MPESA_SHORTCODE")]
    mpesa_shortcode: String,

    #[arg(long, env = "MPESA_PASSKEY", hide_env_values = true)]
    mpesa_passkey: String,

    #[arg(long, env = "MPESA_INITIATOR_NAME")]
    mpesa_initiator_name: String,

    #[arg(long, env = "MPESA_SECURITY_CREDENTIAL", hide_env_values = true)]
    mpesa_security_credential: String,

    /// Provider base URL (sandbox or production)
    #[arg(
        long,
        env = "MPESA_BASE_URL",
        default_value = "https://sandbox.safaricom.co.ke"
    )]
    mpesa_base_url: String,

    /// Public base URL of this service, used to build the webhook URLs the
    /// provider calls back on
    #[arg(long, env = "APP_URL")]
    app_url: String,
}

impl GatewayArgs {
    fn into_config(self) -> GatewayConfig {
        GatewayConfig {
            consumer_key: self.mpesa_consumer_key,
            consumer_secret: self.mpesa_consumer_secret,
            shortcode: self.mpesa_shortcode,
            passkey: self.mpesa_passkey,
            initiator_name: self.mpesa_initiator_name,
            security_credential: self.mpesa_security_credential,
            base_url: self.mpesa_base_url,
            callback_url: format!("{}/api/mpesa/callback", self.app_url),
            result_url: format!("{}/api/mpesa/b2c/callback", self.app_url),
            timeout_url: format!("{}/api/mpesa/b2c/timeout", self.app_url),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Cli::parse();

    let http = reqwest::Client::new();
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(DarajaGateway::new(http, args.gateway.into_config()));

    let services = boot(gateway);
    let app = adapter::router(services);

    let listener = TcpListener::bind(args.bind).await?;
    info!("listening on {}", args.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
