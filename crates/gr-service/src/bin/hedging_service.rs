use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use gr_data::Store;
use gr_risk::RiskConfig;
use gr_service::{seed_demo, Api};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = Arc::new(Store::new());
    let api = Api::new(Arc::clone(&store), RiskConfig::default());
    let seed = seed_demo(&api, chrono::Utc::now().date_naive())?;
    tracing::info!(tenant_id = %seed.tenant.id, user_id = %seed.user.id, "demo tenant ready");

    let addr =
        std::env::var("GRANARY_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let listener = TcpListener::bind(&addr).await?;
    println!("Granary hedging service listening on {addr}");

    loop {
        let (mut socket, _) = listener.accept().await?;

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            let _ = socket.read(&mut buffer).await;

            let body = r#"{"status":"ok","service":"hedging"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );

            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
    }
}
