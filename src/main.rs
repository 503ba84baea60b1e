mod config;
mod error;
mod http_api;
mod image_host;
mod mongo;
mod token;

use dotenvy::dotenv;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let cfg = config::AppConfig::load()?;
    let db = mongo::connect(&cfg).await?;

    http_api::run_http_server(cfg, db).await?;

    Ok(())
}
