//! Download command handler: search, then save the hits into a media directory.

use std::path::Path;

use anyhow::{Context, Result};
use kotoba_audio::{AudioSourceManagerFactory, MediaDirectory, format_audio_tags};
use tracing::info;

use crate::progress;

pub async fn run_download_command(
    factory: &AudioSourceManagerFactory,
    text: &str,
    dest: &Path,
    quiet: bool,
) -> Result<()> {
    let hits = factory.search_audio(text).await?;
    if hits.is_empty() {
        println!("No audio found for {text}.");
        return Ok(());
    }
    let media = MediaDirectory::create(dest)
        .with_context(|| format!("cannot create {}", dest.display()))?;

    let spinner = progress::spinner(quiet, format!("Downloading {} file(s)...", hits.len()));
    let results = factory.download_and_save(&hits, &media).await;
    progress::finish(spinner);
    let results = results?;

    info!(
        saved = results.successes.len(),
        failed = results.fails.len(),
        "download complete"
    );
    for saved in &results.successes {
        println!("Saved {}", saved.file.desired_filename);
    }
    for error in &results.fails {
        println!("Couldn't download {}: {}", error.request().url(), error.describe_short());
    }
    let config = factory.config();
    println!(
        "{}",
        format_audio_tags(&hits, &config.audio_settings.tag_separator)
    );
    Ok(())
}
