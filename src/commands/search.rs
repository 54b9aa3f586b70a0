//! Search command handler: print matching audio files.

use anyhow::Result;
use kotoba_audio::{AudioSourceManagerFactory, format_audio_tags};

pub async fn run_search_command(factory: &AudioSourceManagerFactory, text: &str) -> Result<()> {
    let hits = factory.search_audio(text).await?;
    if hits.is_empty() {
        println!("No audio found for {text}.");
        return Ok(());
    }
    for hit in &hits {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            hit.source_name, hit.word, hit.reading, hit.pitch_number, hit.url
        );
    }
    let config = factory.config();
    println!(
        "{}",
        format_audio_tags(&hits, &config.audio_settings.tag_separator)
    );
    Ok(())
}
