//! Compute collaborator contract.
//!
//! The engine treats all signal-processing and model inference as opaque
//! asynchronous operations behind this trait. Implementations may fail,
//! may emit progress (synthesis only), and are expected to poll the
//! cancellation token at their own safe points; the engine never invokes
//! two operations concurrently.

use async_trait::async_trait;

use crate::engine::{CancellationToken, SynthesisProgress};
use crate::error::Result;
use crate::protocol::request::{
    AlignmentOptions, AudioSource, RecognitionOptions, SpeechLanguageDetectionOptions,
    SpeechTranslationOptions, SynthesisInput, SynthesisOptions, TextLanguageDetectionOptions,
    VoiceListOptions,
};
use crate::protocol::response::{
    AlignmentResult, RecognitionResult, SpeechLanguageDetectionResult, SpeechTranslationResult,
    SynthesisResult, TextLanguageDetectionResult, VoiceListResult,
};

#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Synthesize speech for the given text, emitting segment and sentence
    /// events through `progress` as units complete.
    async fn synthesize(
        &self,
        input: SynthesisInput,
        options: SynthesisOptions,
        progress: &SynthesisProgress,
        token: &CancellationToken,
    ) -> Result<SynthesisResult>;

    /// List the voices available for synthesis.
    async fn voice_list(
        &self,
        options: VoiceListOptions,
        token: &CancellationToken,
    ) -> Result<VoiceListResult>;

    /// Transcribe speech audio.
    async fn recognize(
        &self,
        input: AudioSource,
        options: RecognitionOptions,
        token: &CancellationToken,
    ) -> Result<RecognitionResult>;

    /// Time-align a known transcript to speech audio.
    async fn align(
        &self,
        input: AudioSource,
        transcript: String,
        options: AlignmentOptions,
        token: &CancellationToken,
    ) -> Result<AlignmentResult>;

    /// Transcribe speech audio and translate the transcript.
    async fn translate_speech(
        &self,
        input: AudioSource,
        options: SpeechTranslationOptions,
        token: &CancellationToken,
    ) -> Result<SpeechTranslationResult>;

    /// Identify the language spoken in the audio.
    async fn detect_speech_language(
        &self,
        input: AudioSource,
        options: SpeechLanguageDetectionOptions,
        token: &CancellationToken,
    ) -> Result<SpeechLanguageDetectionResult>;

    /// Identify the language of a text.
    async fn detect_text_language(
        &self,
        input: String,
        options: TextLanguageDetectionOptions,
        token: &CancellationToken,
    ) -> Result<TextLanguageDetectionResult>;
}
