use anyhow::{Context, Result};
use cipher_eval::config::{cli, Settings};
use log::info;

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let settings = Settings::from_matches(&matches);

    env_logger::Builder::new()
        .filter_level(settings.log_level)
        .parse_default_env()
        .init();

    if !settings.dataset_root.is_dir() {
        anyhow::bail!("{:?} is not a directory", settings.dataset_root);
    }

    let summary = cipher_eval::run(&settings)
        .with_context(|| format!("Failed to analyze {:?}", settings.dataset_root))?;

    info!(
        "Processed {} folders: {} files analyzed, {} already processed",
        summary.folders.len(),
        summary.analyzed(),
        summary.skipped()
    );
    Ok(())
}
