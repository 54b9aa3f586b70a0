//! Init command handler: fetch and cache enabled audio sources.

use anyhow::{Context, Result};
use kotoba_audio::{AudioSourceManagerFactory, InitResult};
use url::Url;

use crate::progress;

pub async fn run_init_command(factory: &AudioSourceManagerFactory, quiet: bool) -> Result<()> {
    let result = init_with_spinner(factory, quiet).await?;
    if !result.did_run {
        println!("Audio sources haven't changed.");
    }
    for source in &result.sources {
        println!("Initialized audio source: {}", source.name());
    }
    for error in &result.errors {
        println!("Couldn't download audio source: {}.", error.explanation());
    }
    if result.did_run && !result.sources.is_empty() {
        let stats = factory.get_statistics().await?;
        println!("Unique audio files: {}", stats.unique_files);
        println!("Unique headwords: {}", stats.unique_headwords);
    }
    Ok(())
}

/// Runs one initialization pass behind a spinner naming the hosts involved.
pub(crate) async fn init_with_spinner(
    factory: &AudioSourceManagerFactory,
    quiet: bool,
) -> Result<InitResult> {
    let config = factory.config();
    let hosts: Vec<String> = config
        .enabled_sources()
        .iter()
        .map(|source| {
            Url::parse(&source.url)
                .ok()
                .and_then(|url| url.host_str().map(ToString::to_string))
                .unwrap_or_else(|| "local disk".to_string())
        })
        .collect();
    let spinner = progress::spinner(
        quiet,
        format!("Initializing {} audio source(s) from {}...", hosts.len(), hosts.join(", ")),
    );
    let result = factory
        .init_sources()
        .await
        .context("failed to initialize audio sources");
    progress::finish(spinner);
    result
}
