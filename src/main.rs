use calreport::app;
use calreport::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    log::info!("using database directory {}", config.database_dir.display());

    // Start the web application
    app::run(config).await?;

    Ok(())
}
