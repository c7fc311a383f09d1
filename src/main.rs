use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epa_air_collector::config::Config;
use epa_air_collector::formatters::{format_preview, format_sites, format_summary, readings_to_csv};
use epa_air_collector::service::AirQualityService;
use epa_air_collector::transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // API_KEY usually lives in a local .env
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "epa_air_collector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::parse();
    config.validate()?;

    let transport = HttpTransport::new(&config.base_url, &config.api_key, config.request_timeout())?;
    let service = AirQualityService::from_config(Arc::new(transport), &config);

    if config.list_sites {
        let sites = service.sites().await?;
        print!("{}", format_sites(&sites));
        return Ok(());
    }

    tracing::info!(
        base_url = %config.base_url,
        rate_per_sec = config.rate_per_sec,
        "starting air-quality collection"
    );
    let run = service.run().await?;

    print!("{}", format_summary(&run));
    print!("{}", format_preview(&run.readings, config.preview_rows));

    std::fs::write(&config.output, readings_to_csv(&run.readings))
        .with_context(|| format!("failed to write {}", config.output.display()))?;
    tracing::info!(path = %config.output.display(), rows = run.readings.len(), "saved readings");

    Ok(())
}
