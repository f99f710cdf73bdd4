//! The drain loop: one queue, one job at a time.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::SpeechBackend;
use crate::error::{Error, Result};
use crate::protocol::request::{RequestBody, RequestEnvelope};
use crate::protocol::response::{ResponseBody, ResponseEnvelope, SynthesisEventData};

use super::cancellation::{CancellationRegistry, CancellationToken};

/// One event produced by the engine for a request.
#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub envelope: ResponseEnvelope,

    /// Terminal events are the last event for their request id; the
    /// result router prunes routing state when it sees one.
    pub terminal: bool,
}

/// Cloneable submission side of the engine.
///
/// Submission and cancellation are the only operations reachable from
/// outside the engine's execution context; everything else crosses the
/// boundary as events.
#[derive(Clone)]
pub struct EngineHandle {
    jobs: mpsc::UnboundedSender<RequestEnvelope>,
    cancellations: Arc<CancellationRegistry>,
}

impl EngineHandle {
    /// Append a job to the queue.
    pub fn submit(&self, envelope: RequestEnvelope) -> Result<()> {
        debug!(
            request_id = %envelope.request_id,
            operation = envelope.operation_name(),
            "enqueueing job"
        );
        self.jobs.send(envelope).map_err(|_| Error::EngineStopped)
    }

    /// Flag a request id for cancellation.
    ///
    /// Never queued, never answered: an id with no queued or active job is
    /// a silent no-op.
    pub fn cancel(&self, request_id: &str) {
        debug!(request_id, "cancellation requested");
        self.cancellations.mark(request_id);
    }
}

/// Emitter for synthesis progress events, tagged with the owning job's
/// request id. Handlers may call it zero or more times before settling.
pub struct SynthesisProgress {
    request_id: String,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl SynthesisProgress {
    /// Build an emitter feeding `events`. The engine builds one per
    /// synthesis job; backend tests can build their own.
    pub fn new(
        request_id: impl Into<String>,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            events,
        }
    }

    pub fn segment(&self, data: SynthesisEventData) {
        self.emit(ResponseBody::SynthesisSegmentEvent(data));
    }

    pub fn sentence(&self, data: SynthesisEventData) {
        self.emit(ResponseBody::SynthesisSentenceEvent(data));
    }

    fn emit(&self, body: ResponseBody) {
        let event = EngineEvent {
            envelope: ResponseEnvelope::new(self.request_id.clone(), body),
            terminal: false,
        };
        // The router may already be gone during shutdown; progress is
        // droppable by contract.
        let _ = self.events.send(event);
    }
}

/// The execution engine: a FIFO queue and its single drain task.
pub struct ExecutionEngine {
    backend: Arc<dyn SpeechBackend>,
    cancellations: Arc<CancellationRegistry>,
    jobs: mpsc::UnboundedReceiver<RequestEnvelope>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl ExecutionEngine {
    /// Create an engine plus its submission handle and event stream.
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
    ) -> (Self, EngineHandle, mpsc::UnboundedReceiver<EngineEvent>) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancellations = Arc::new(CancellationRegistry::new());

        let engine = Self {
            backend,
            cancellations: cancellations.clone(),
            jobs: job_rx,
            events: event_tx,
        };
        let handle = EngineHandle {
            jobs: job_tx,
            cancellations,
        };

        (engine, handle, event_rx)
    }

    /// Drain the queue until every submission handle is dropped.
    ///
    /// Jobs are processed strictly in arrival order; a job runs to
    /// completion (or to a cooperative cancellation checkpoint inside the
    /// handler) before the next job starts. No failure of any single job
    /// ever ends this loop.
    pub async fn run(mut self) {
        while let Some(envelope) = self.jobs.recv().await {
            // Let pending I/O, new connections and new enqueues proceed
            // before the job's primary computation starts.
            tokio::task::yield_now().await;

            self.process(envelope).await;
        }
        debug!("job queue closed, engine stopping");
    }

    /// Run one job and emit exactly one terminal event for it.
    async fn process(&self, envelope: RequestEnvelope) {
        let request_id = envelope.request_id.clone();
        let operation = envelope.operation_name();
        let token = CancellationToken::new(request_id.clone(), self.cancellations.clone());

        let outcome = if token.is_cancellation_requested() {
            // Canceled while still queued: skip the handler entirely, so
            // the job produces zero progress events.
            debug!(request_id = %request_id, "job canceled before start");
            Err(Error::Canceled)
        } else {
            match AssertUnwindSafe(self.dispatch(envelope, &token))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let detail = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "handler panicked".to_string());
                    Err(Error::Backend(detail))
                }
            }
        };

        let terminal = match outcome {
            Ok(body) => ResponseEnvelope::new(request_id.clone(), body),
            Err(error) => {
                if error.is_cancellation() {
                    debug!(request_id = %request_id, operation, "job canceled");
                } else {
                    warn!(request_id = %request_id, operation, %error, "job failed");
                }
                ResponseEnvelope::from_error(request_id.clone(), &error)
            }
        };

        let _ = self.events.send(EngineEvent {
            envelope: terminal,
            terminal: true,
        });
    }

    /// Select the handler matching the job's operation type and invoke it.
    async fn dispatch(
        &self,
        envelope: RequestEnvelope,
        token: &CancellationToken,
    ) -> Result<ResponseBody> {
        let request_id = envelope.request_id;

        match envelope.body {
            RequestBody::SynthesisRequest { input, options } => {
                let progress = SynthesisProgress {
                    request_id,
                    events: self.events.clone(),
                };
                let result = self
                    .backend
                    .synthesize(input, options, &progress, token)
                    .await?;
                Ok(ResponseBody::SynthesisResponse(result))
            }
            RequestBody::VoiceListRequest { options } => {
                let result = self.backend.voice_list(options, token).await?;
                Ok(ResponseBody::VoiceListResponse(result))
            }
            RequestBody::RecognitionRequest { input, options } => {
                let result = self.backend.recognize(input, options, token).await?;
                Ok(ResponseBody::RecognitionResponse(result))
            }
            RequestBody::AlignmentRequest {
                input,
                transcript,
                options,
            } => {
                let result = self.backend.align(input, transcript, options, token).await?;
                Ok(ResponseBody::AlignmentResponse(result))
            }
            RequestBody::SpeechTranslationRequest { input, options } => {
                let result = self.backend.translate_speech(input, options, token).await?;
                Ok(ResponseBody::SpeechTranslationResponse(result))
            }
            RequestBody::SpeechLanguageDetectionRequest { input, options } => {
                let result = self
                    .backend
                    .detect_speech_language(input, options, token)
                    .await?;
                Ok(ResponseBody::SpeechLanguageDetectionResponse(result))
            }
            RequestBody::TextLanguageDetectionRequest { input, options } => {
                let result = self
                    .backend
                    .detect_text_language(input, options, token)
                    .await?;
                Ok(ResponseBody::TextLanguageDetectionResponse(result))
            }
            // The gateway routes cancellation signals to the registry and
            // never enqueues them.
            RequestBody::CancellationRequest {} => Err(Error::InvalidInput(
                "cancellation signals are not queueable".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::request::{
        AlignmentOptions, AudioSource, RecognitionOptions, SpeechLanguageDetectionOptions,
        SpeechTranslationOptions, SynthesisInput, SynthesisOptions, TextLanguageDetectionOptions,
        VoiceListOptions,
    };
    use crate::protocol::response::{
        AlignmentResult, AudioPayload, LanguageProbability, RawAudio, RecognitionResult,
        SpeechLanguageDetectionResult, SpeechTranslationResult, SynthesisResult,
        TextLanguageDetectionResult, VoiceInfo, VoiceListResult,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    /// Scriptable backend: behavior is selected through the voice option.
    struct MockBackend;

    #[async_trait]
    impl SpeechBackend for MockBackend {
        async fn synthesize(
            &self,
            input: SynthesisInput,
            options: SynthesisOptions,
            progress: &SynthesisProgress,
            token: &CancellationToken,
        ) -> Result<SynthesisResult> {
            match options.voice.as_deref() {
                Some("panic") => panic!("synthetic failure"),
                Some("fail") => return Err(Error::Backend("scripted failure".into())),
                _ => {}
            }

            let segments = input.into_segments();
            for (index, segment) in segments.iter().enumerate() {
                token.bail_if_canceled()?;
                tokio::time::sleep(Duration::from_millis(5)).await;
                progress.sentence(SynthesisEventData {
                    index,
                    total: Some(segments.len()),
                    transcript: segment.clone(),
                    timeline: Vec::new(),
                    audio: None,
                });
            }
            token.bail_if_canceled()?;

            Ok(SynthesisResult {
                audio: AudioPayload::Raw(RawAudio {
                    sample_rate: 22050,
                    channels: 1,
                    samples: Vec::new(),
                }),
                timeline: Vec::new(),
                language: None,
                voice: options.voice,
            })
        }

        async fn voice_list(
            &self,
            _options: VoiceListOptions,
            _token: &CancellationToken,
        ) -> Result<VoiceListResult> {
            Ok(VoiceListResult {
                voices: vec![VoiceInfo {
                    name: "mock".into(),
                    languages: vec!["en".into()],
                    gender: None,
                }],
            })
        }

        async fn recognize(
            &self,
            _input: AudioSource,
            _options: RecognitionOptions,
            _token: &CancellationToken,
        ) -> Result<RecognitionResult> {
            Err(Error::Unsupported("no recognition engine".into()))
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
                source_language: options.source_language,
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
                detected_language: options.default_language.clone(),
                results: vec![LanguageProbability {
                    language: options.default_language,
                    probability: 1.0,
                }],
            })
        }
    }

    fn spawn_engine() -> (EngineHandle, mpsc::UnboundedReceiver<EngineEvent>) {
        let (engine, handle, events) = ExecutionEngine::new(Arc::new(MockBackend));
        tokio::spawn(engine.run());
        (handle, events)
    }

    fn synthesis(request_id: &str, voice: Option<&str>) -> RequestEnvelope {
        RequestEnvelope::new(
            request_id,
            RequestBody::SynthesisRequest {
                input: SynthesisInput::Segments(vec!["one".into(), "two".into()]),
                options: SynthesisOptions {
                    voice: voice.map(str::to_string),
                    ..SynthesisOptions::default()
                },
            },
        )
    }

    async fn collect_until_terminals(
        events: &mut mpsc::UnboundedReceiver<EngineEvent>,
        terminals: usize,
    ) -> Vec<EngineEvent> {
        let mut collected = Vec::new();
        let mut seen = 0;
        while seen < terminals {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for engine events")
                .expect("engine event channel closed early");
            if event.terminal {
                seen += 1;
            }
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn test_fifo_order_across_jobs() {
        let (handle, mut events) = spawn_engine();

        for id in ["a", "b", "c"] {
            handle.submit(synthesis(id, None)).unwrap();
        }

        let collected = collect_until_terminals(&mut events, 3).await;
        let terminal_ids: Vec<_> = collected
            .iter()
            .filter(|e| e.terminal)
            .map(|e| e.envelope.request_id.clone())
            .collect();

        assert_eq!(terminal_ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_with_progress_before_it() {
        let (handle, mut events) = spawn_engine();
        handle.submit(synthesis("job", None)).unwrap();

        let collected = collect_until_terminals(&mut events, 1).await;

        let terminal_positions: Vec<_> = collected
            .iter()
            .enumerate()
            .filter(|(_, e)| e.terminal)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(terminal_positions, vec![collected.len() - 1]);

        // Two segments produce two sentence progress events.
        let progress = collected.iter().filter(|e| !e.terminal).count();
        assert_eq!(progress, 2);
        assert_eq!(
            collected.last().unwrap().envelope.message_type(),
            "SynthesisResponse"
        );
    }

    #[tokio::test]
    async fn test_cancel_before_dequeue_yields_error_without_progress() {
        let (handle, mut events) = spawn_engine();

        handle.submit(synthesis("first", None)).unwrap();
        handle.submit(synthesis("victim", None)).unwrap();
        handle.cancel("victim");

        let collected = collect_until_terminals(&mut events, 2).await;

        let victim_events: Vec<_> = collected
            .iter()
            .filter(|e| e.envelope.request_id == "victim")
            .collect();
        assert_eq!(victim_events.len(), 1);
        assert!(victim_events[0].terminal);
        match &victim_events[0].envelope.body {
            ResponseBody::Error { error } => assert!(error.canceled),
            other => panic!("expected error terminal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_has_no_effect() {
        let (handle, mut events) = spawn_engine();

        handle.cancel("never-submitted");
        handle.submit(synthesis("real", None)).unwrap();

        let collected = collect_until_terminals(&mut events, 1).await;
        assert_eq!(
            collected.last().unwrap().envelope.message_type(),
            "SynthesisResponse"
        );
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_block_next_job() {
        let (handle, mut events) = spawn_engine();

        handle
            .submit(RequestEnvelope::new(
                "fails",
                RequestBody::RecognitionRequest {
                    input: AudioSource::Path("missing.wav".into()),
                    options: RecognitionOptions::default(),
                },
            ))
            .unwrap();
        handle.submit(synthesis("succeeds", None)).unwrap();

        let collected = collect_until_terminals(&mut events, 2).await;
        let terminals: Vec<_> = collected.iter().filter(|e| e.terminal).collect();

        assert_eq!(terminals[0].envelope.request_id, "fails");
        assert_eq!(terminals[0].envelope.message_type(), "Error");
        assert_eq!(terminals[1].envelope.request_id, "succeeds");
        assert_eq!(terminals[1].envelope.message_type(), "SynthesisResponse");
    }

    #[tokio::test]
    async fn test_handler_panic_does_not_abort_the_loop() {
        let (handle, mut events) = spawn_engine();

        handle.submit(synthesis("explodes", Some("panic"))).unwrap();
        handle.submit(synthesis("survives", None)).unwrap();

        let collected = collect_until_terminals(&mut events, 2).await;
        let terminals: Vec<_> = collected.iter().filter(|e| e.terminal).collect();

        assert_eq!(terminals[0].envelope.message_type(), "Error");
        match &terminals[0].envelope.body {
            ResponseBody::Error { error } => {
                assert!(!error.canceled);
                assert!(error.message.contains("synthetic failure"));
            }
            other => panic!("expected error terminal, got {other:?}"),
        }
        assert_eq!(terminals[1].envelope.message_type(), "SynthesisResponse");
    }

    #[tokio::test]
    async fn test_no_events_after_terminal() {
        let (handle, mut events) = spawn_engine();
        handle.submit(synthesis("only", None)).unwrap();

        collect_until_terminals(&mut events, 1).await;

        // Give a stray event time to show up if one were coming.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(events.try_recv().is_err());
    }
}
