//! Voice + music mixing with ducking.

use std::path::{Path, PathBuf};

use reelcut_common::config::DuckingConfig;
use reelcut_common::error::{ReelcutError, ReelcutResult};
use reelcut_processing_core::ducking::DuckingEnvelope;
use reelcut_processing_core::voice_activity::{TimeRange, VadConfig, VoiceActivityDetector};
use reelcut_project_model::request::AudioMixSpec;

use crate::executor::{MediaExecutor, MixAudioRequest, MusicInput, ToolProgress};
use crate::workspace::JobWorkspace;

/// The job's mixed audio track.
#[derive(Debug, Clone)]
pub struct MixedAudio {
    pub path: PathBuf,
    pub duration_secs: f64,
    /// Speech windows that drove the ducking (empty when not ducking).
    pub voice_windows: Vec<TimeRange>,
    pub envelope: Option<DuckingEnvelope>,
}

pub struct AudioMixer {
    ducking: DuckingConfig,
    sample_rate: u32,
}

impl AudioMixer {
    pub fn new(ducking: DuckingConfig, sample_rate: u32) -> Self {
        Self {
            ducking,
            sample_rate,
        }
    }

    /// Fail with `AudioSourceNotFound` for any missing input.
    pub fn check_sources(spec: &AudioMixSpec) -> ReelcutResult<()> {
        for path in std::iter::once(&spec.voice_path).chain(spec.music_path.as_ref()) {
            if !path.is_file() {
                return Err(ReelcutError::AudioSourceNotFound { path: path.clone() });
            }
        }
        Ok(())
    }

    /// Speech windows of the voice track.
    pub async fn detect_voice(
        &self,
        executor: &dyn MediaExecutor,
        voice: &Path,
    ) -> ReelcutResult<Vec<TimeRange>> {
        let rate = self.ducking.analysis_sample_rate;
        let samples = executor.decode_mono_pcm(voice, rate).await?;
        let detector = VoiceActivityDetector::new(VadConfig::from(&self.ducking));
        Ok(detector.detect(&samples, rate))
    }

    /// Music gain over the timeline.
    pub fn envelope(&self, spec: &AudioMixSpec, windows: &[TimeRange]) -> DuckingEnvelope {
        if spec.ducking_active() {
            DuckingEnvelope::from_windows(windows, spec.music_volume, &self.ducking)
        } else {
            DuckingEnvelope::flat(spec.music_volume)
        }
    }

    /// Mix the track to cover exactly `duration_secs`.
    pub async fn mix(
        &self,
        spec: &AudioMixSpec,
        duration_secs: f64,
        executor: &dyn MediaExecutor,
        workspace: &JobWorkspace,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<MixedAudio> {
        Self::check_sources(spec)?;

        let mut voice_windows = Vec::new();
        let mut envelope = None;
        let music = match &spec.music_path {
            None => None,
            Some(music_path) => {
                if spec.ducking_active() {
                    voice_windows = self.detect_voice(executor, &spec.voice_path).await?;
                    if voice_windows.is_empty() {
                        tracing::info!("Voice track is silent, music stays at its configured level");
                    }
                }
                let env = self.envelope(spec, &voice_windows);
                let music = MusicInput {
                    path: music_path.clone(),
                    volume_expr: env.to_volume_expr(),
                };
                envelope = Some(env);
                Some(music)
            }
        };

        let output = workspace.file("mix.wav");
        tracing::info!(
            duration_secs,
            music = music.is_some(),
            voice_windows = voice_windows.len(),
            "Mixing audio"
        );
        executor
            .mix_audio(
                &MixAudioRequest {
                    voice: spec.voice_path.clone(),
                    music,
                    output: output.clone(),
                    duration_secs,
                    sample_rate: self.sample_rate,
                },
                progress,
            )
            .await?;

        Ok(MixedAudio {
            path: output,
            duration_secs,
            voice_windows,
            envelope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_voice_or_music_reported() {
        let dir = tempfile::tempdir().unwrap();
        let voice = dir.path().join("voice.wav");
        let spec = AudioMixSpec::voice_only(&voice);
        assert!(matches!(
            AudioMixer::check_sources(&spec),
            Err(ReelcutError::AudioSourceNotFound { path }) if path == voice
        ));

        std::fs::write(&voice, b"RIFF").unwrap();
        assert!(AudioMixer::check_sources(&spec).is_ok());

        let mut with_music = spec.clone();
        with_music.music_path = Some(dir.path().join("music.mp3"));
        assert!(matches!(
            AudioMixer::check_sources(&with_music),
            Err(ReelcutError::AudioSourceNotFound { .. })
        ));
    }

    #[test]
    fn test_envelope_is_flat_without_ducking() {
        let mixer = AudioMixer::new(DuckingConfig::default(), 48_000);
        let mut spec = AudioMixSpec::voice_only("voice.wav");
        spec.music_path = Some("music.mp3".into());
        spec.ducking = false;
        let env = mixer.envelope(&spec, &[TimeRange::new(1.0, 6.0)]);
        assert!(env.is_flat());

        spec.ducking = true;
        let env = mixer.envelope(&spec, &[TimeRange::new(1.0, 6.0)]);
        assert!(env.gain_at(3.0) < env.gain_at(0.1));
    }
}
