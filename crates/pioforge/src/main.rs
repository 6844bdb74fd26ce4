use pioforge::prelude::*;

/// Listen address. Default: `127.0.0.1:7777`.
const BIND_ENV: &str = "PIOFORGE_BIND";
/// Directory holding `binaries.bin`, `cost_table.json` and `srv_table.json`.
const DATA_DIR_ENV: &str = "PIOFORGE_DATA_DIR";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pioforge::init_tracing();

    let mut builder = Server::builder();
    if let Ok(addr) = std::env::var(BIND_ENV) {
        builder = builder.bind(&addr);
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        let payload = GameReadyPayload::load(&dir).await?;
        match SpeedUpTable::from_cost_table(payload.cost_table_json()) {
            Ok(table) => builder = builder.speed_ups(table),
            Err(e) => tracing::warn!(error = %e, "cost table has no speed-up prices, using defaults"),
        }
        tracing::info!(%dir, binaries = payload.binaries.len(), "loaded game data");
        builder = builder.game_ready(payload);
    }

    let server = builder.build().await?;
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown.cancel();
        }
    });
    server.run().await?;
    Ok(())
}
