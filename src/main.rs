use kubestatus::config::Settings;
use kubestatus::server::StatusServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().compact().init();

    let settings = Settings::load()?;
    let server = StatusServer::new(settings).await?;

    tracing::info!(addr = %server.addr, "serving status");
    server.serve().await
}
