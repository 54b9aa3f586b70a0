//! Purge command handler.

use anyhow::{Context, Result};
use kotoba_audio::AudioSourceManagerFactory;

pub fn run_purge_command(factory: &AudioSourceManagerFactory) -> Result<()> {
    factory
        .purge_everything()
        .context("failed to purge the cache store")?;
    println!("Removed {}", factory.store().path().display());
    Ok(())
}
