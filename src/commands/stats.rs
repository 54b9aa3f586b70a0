//! Stats command handler.

use anyhow::Result;
use kotoba_audio::AudioSourceManagerFactory;

pub async fn run_stats_command(factory: &AudioSourceManagerFactory) -> Result<()> {
    let stats = factory.get_statistics().await?;
    for source in &stats.sources {
        println!(
            "{}: {} files, {} headwords",
            source.source_name, source.num_files, source.num_headwords
        );
    }
    println!("Unique audio files: {}", stats.unique_files);
    println!("Unique headwords: {}", stats.unique_headwords);
    Ok(())
}
