use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use xform_formlist::{Cli, ConfigManager, FormListEngine};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;
    let sources = cli
        .form_sources()
        .await
        .context("Failed to open form source")?;

    let engine = FormListEngine::new(config)?;
    let form_list = engine.create_form_list(sources).await?;

    match &cli.output {
        Some(path) => tokio::fs::write(path, form_list)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", form_list),
    }

    Ok(())
}
