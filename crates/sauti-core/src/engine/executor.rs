//! Engine placement.
//!
//! The engine runs either on the ambient runtime or on one dedicated
//! single-threaded runtime chosen once at startup and fixed for the
//! process lifetime. Never a pool: the compute collaborators are assumed
//! unsafe or inefficient to invoke concurrently with themselves. Both
//! placements honor the identical job/event contract.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::backend::SpeechBackend;

use super::dispatch::{EngineEvent, EngineHandle, ExecutionEngine};

/// Where the execution engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    /// Spawn the engine as a task on the current runtime.
    InProcess,
    /// Host the engine on its own single-threaded runtime on a dedicated
    /// OS thread, reachable only by message passing, so the accept/I/O
    /// path stays responsive during heavy computation.
    #[default]
    Dedicated,
}

/// Engine spawner.
pub struct Executor;

impl Executor {
    /// Start the engine and return its handle plus the event stream.
    pub fn spawn(
        backend: Arc<dyn SpeechBackend>,
        kind: ExecutorKind,
    ) -> (EngineHandle, mpsc::UnboundedReceiver<EngineEvent>) {
        let (engine, handle, events) = ExecutionEngine::new(backend);

        match kind {
            ExecutorKind::InProcess => {
                info!("starting execution engine in-process");
                tokio::spawn(engine.run());
            }
            ExecutorKind::Dedicated => {
                info!("starting execution engine on a dedicated worker thread");
                std::thread::Builder::new()
                    .name("sauti-engine".into())
                    .spawn(move || {
                        let runtime = tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                            .expect("failed to build engine runtime");
                        runtime.block_on(engine.run());
                    })
                    .expect("failed to spawn engine thread");
            }
        }

        (handle, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::engine::{CancellationToken, SynthesisProgress};
    use crate::protocol::request::*;
    use crate::protocol::response::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoBackend;

    #[async_trait]
    impl SpeechBackend for EchoBackend {
        async fn synthesize(
            &self,
            _input: SynthesisInput,
            _options: SynthesisOptions,
            _progress: &SynthesisProgress,
            _token: &CancellationToken,
        ) -> Result<SynthesisResult> {
            Ok(SynthesisResult {
                audio: AudioPayload::Raw(RawAudio {
                    sample_rate: 22050,
                    channels: 1,
                    samples: Vec::new(),
                }),
                timeline: Vec::new(),
                language: None,
                voice: None,
            })
        }

        async fn voice_list(
            &self,
            _options: VoiceListOptions,
            _token: &CancellationToken,
        ) -> Result<VoiceListResult> {
            Ok(VoiceListResult { voices: Vec::new() })
        }

        async fn recognize(
            &self,
            _input: AudioSource,
            _options: RecognitionOptions,
            _token: &CancellationToken,
        ) -> Result<RecognitionResult> {
            Ok(RecognitionResult {
                transcript: "echo".into(),
                timeline: Vec::new(),
                language: None,
                input_raw_audio: None,
            })
        }

        async fn align(
            &self,
            _input: AudioSource,
            _transcript: String,
            _options: AlignmentOptions,
            _token: &CancellationToken,
        ) -> Result<AlignmentResult> {
            Ok(AlignmentResult {
                timeline: Vec::new(),
                input_raw_audio: None,
            })
        }

        async fn translate_speech(
            &self,
            _input: AudioSource,
            options: SpeechTranslationOptions,
            _token: &CancellationToken,
        ) -> Result<SpeechTranslationResult> {
            Ok(SpeechTranslationResult {
                transcript: String::new(),
                translated_transcript: String::new(),
                source_language: None,
                target_language: options.target_language,
                timeline: Vec::new(),
                input_raw_audio: None,
            })
        }

        async fn detect_speech_language(
            &self,
            _input: AudioSource,
            options: SpeechLanguageDetectionOptions,
            _token: &CancellationToken,
        ) -> Result<SpeechLanguageDetectionResult> {
            Ok(SpeechLanguageDetectionResult {
                detected_language: options.default_language,
                results: Vec::new(),
                input_raw_audio: None,
            })
        }

        async fn detect_text_language(
            &self,
            _input: String,
            options: TextLanguageDetectionOptions,
            _token: &CancellationToken,
        ) -> Result<TextLanguageDetectionResult> {
            Ok(TextLanguageDetectionResult {
                detected_language: options.default_language,
                results: Vec::new(),
            })
        }
    }

    async fn roundtrip(kind: ExecutorKind) {
        let (handle, mut events) = Executor::spawn(Arc::new(EchoBackend), kind);

        handle
            .submit(RequestEnvelope::new(
                "r1",
                RequestBody::RecognitionRequest {
                    input: AudioSource::Path("a.wav".into()),
                    options: RecognitionOptions::default(),
                },
            ))
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out")
            .expect("event channel closed");
        assert!(event.terminal);
        assert_eq!(event.envelope.request_id, "r1");
        assert_eq!(event.envelope.message_type(), "RecognitionResponse");
    }

    #[tokio::test]
    async fn test_in_process_executor_roundtrip() {
        roundtrip(ExecutorKind::InProcess).await;
    }

    #[tokio::test]
    async fn test_dedicated_executor_roundtrip() {
        roundtrip(ExecutorKind::Dedicated).await;
    }
}
