use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::domain::audio::VOICES;
use crate::infra::tts::TtsClient;

const SAMPLE_TEXT: &str =
    "Hello! This is a preview of how this voice sounds. Thanks for trying VoiceText Pro.";

// Provider rate limits are respected by strict sequencing with a fixed pause
// between calls; there is no retry and no parallelism.
const INTER_CALL_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SampleRunSummary {
    pub written: usize,
    pub failed: usize,
}

/// One-shot batch: synthesize a preview for every catalog voice into
/// `samples_dir/{voice_id}.mp3`. A per-voice failure is logged and the batch
/// moves on; only setup errors (the directory itself) abort the run.
pub async fn run(tts: &dyn TtsClient, samples_dir: &Path) -> Result<SampleRunSummary> {
    tokio::fs::create_dir_all(samples_dir).await?;
    info!(dir = %samples_dir.display(), voices = VOICES.len(), "sample generation started");

    let mut summary = SampleRunSummary::default();

    for (index, voice) in VOICES.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(INTER_CALL_DELAY).await;
        }

        match generate_one(tts, samples_dir, voice.id).await {
            Ok(bytes) => {
                info!(voice_id = voice.id, voice = voice.name, bytes, "sample written");
                summary.written += 1;
            }
            Err(err) => {
                error!(error = ?err, voice_id = voice.id, voice = voice.name, "sample failed");
                summary.failed += 1;
            }
        }
    }

    info!(
        written = summary.written,
        failed = summary.failed,
        "sample generation finished"
    );
    Ok(summary)
}

async fn generate_one(tts: &dyn TtsClient, samples_dir: &Path, voice_id: &str) -> Result<usize> {
    let audio = tts.synthesize(voice_id, SAMPLE_TEXT).await?;
    let path = samples_dir.join(format!("{}.mp3", voice_id));
    tokio::fs::write(&path, &audio).await?;
    Ok(audio.len())
}
