use std::sync::Arc;

use chrono::Utc;

use stock_pulse::config::Config;
use stock_pulse::db::Repository;
use stock_pulse::error::Result;
use stock_pulse::forecast::BaselineModel;
use stock_pulse::pipeline::Pipeline;
use stock_pulse::sentiment::StrategySlots;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::load()?;

    let repo = Arc::new(Repository::new(&config.db_path).await?);

    // Headless rescoring pass. External model strategies are wired in by
    // embedding callers; the built-in keyword strategy always runs.
    let pipeline = Pipeline::new(
        repo,
        StrategySlots::keyword_only(),
        config.combine,
        Box::new(BaselineModel::default()),
    );

    let processed = pipeline.rescore_pending(Utc::now()).await?;
    println!("Processed {} pending links", processed);

    Ok(())
}
