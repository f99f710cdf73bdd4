//! Built-in reference backend.
//!
//! `BasicBackend` implements the speech operations that need no model
//! runtime: tone-based synthesis with sentence/segment progress events,
//! voice listing, duration-proportional alignment, and a script-based
//! text language heuristic. Recognition, speech translation and speech
//! language detection need model inference and report `Unsupported`,
//! after resolving any requested model package so the failure message
//! can say what is actually installed.

use async_trait::async_trait;
use sauti_core::engine::{CancellationToken, SynthesisProgress};
use sauti_core::packages::PackageResolver;
use sauti_core::protocol::request::{
    AlignmentOptions, AudioSource, RecognitionOptions, SpeechLanguageDetectionOptions,
    SpeechTranslationOptions, SynthesisInput, SynthesisOptions, TextLanguageDetectionOptions,
    VoiceListOptions,
};
use sauti_core::protocol::response::{
    AlignmentResult, AudioPayload, LanguageProbability, RawAudio, RecognitionResult,
    SpeechLanguageDetectionResult, SpeechTranslationResult, SynthesisEventData, SynthesisResult,
    TextLanguageDetectionResult, TimelineEntry, VoiceInfo, VoiceListResult,
};
use sauti_core::transcode::{FfmpegTranscoder, TranscodeOptions};
use sauti_core::{Error, Result, SpeechBackend};
use tracing::debug;

const BUILTIN_VOICE: &str = "tone";
const SAMPLE_RATE: u32 = 22050;

/// Seconds of speech per character at speed 1.0.
const SECONDS_PER_CHAR: f64 = 0.08;
const PAUSE_SECS: f64 = 0.15;

pub struct BasicBackend {
    packages: PackageResolver,
    transcoder: FfmpegTranscoder,
    sample_rate: u32,
}

impl BasicBackend {
    pub fn new(packages: PackageResolver, transcoder: FfmpegTranscoder) -> Self {
        Self {
            packages,
            transcoder,
            sample_rate: SAMPLE_RATE,
        }
    }

    /// Render one sentence as a fixed-pitch tone followed by a short
    /// pause. Pitch is derived from the text so distinct sentences are
    /// audibly distinct.
    fn render_sentence(&self, text: &str, speed: f32) -> Vec<f32> {
        let speed = if speed > 0.0 { speed as f64 } else { 1.0 };
        let voiced_secs =
            (text.chars().count() as f64 * SECONDS_PER_CHAR / speed).clamp(0.2, 8.0);
        let frequency = 180.0 + (text.len() % 12) as f64 * 15.0;

        let sample_rate = self.sample_rate as f64;
        let voiced = (voiced_secs * sample_rate) as usize;
        let pause = (PAUSE_SECS * sample_rate) as usize;

        let mut samples = Vec::with_capacity(voiced + pause);
        for n in 0..voiced {
            let t = n as f64 / sample_rate;
            // Short fade at both ends to avoid clicks.
            let envelope = (t / 0.01).min(1.0).min((voiced_secs - t) / 0.01).max(0.0);
            samples.push((0.25 * envelope * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32);
        }
        samples.extend(std::iter::repeat(0.0).take(pause));
        samples
    }

    async fn load_audio(&self, input: AudioSource) -> Result<RawAudio> {
        let encoded = match input {
            AudioSource::Encoded(bytes) => bytes,
            AudioSource::Path(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| Error::InvalidInput(format!("cannot read audio '{path}': {e}")))?,
        };
        self.transcoder.decode_to_raw(&encoded, self.sample_rate).await
    }

    /// Resolve the requested model package, then report that no inference
    /// runtime is available for `operation`.
    async fn model_gap(&self, operation: &str, engine: Option<&str>) -> Error {
        if let Some(engine) = engine {
            match self.packages.resolve(engine).await {
                Ok(dir) => Error::Unsupported(format!(
                    "{operation} needs a model runtime; package '{engine}' is installed at {} \
                     but the built-in backend cannot run it",
                    dir.display()
                )),
                Err(error) => error,
            }
        } else {
            Error::Unsupported(format!(
                "{operation} is not provided by the built-in backend"
            ))
        }
    }
}

#[async_trait]
impl SpeechBackend for BasicBackend {
    async fn synthesize(
        &self,
        input: SynthesisInput,
        options: SynthesisOptions,
        progress: &SynthesisProgress,
        token: &CancellationToken,
    ) -> Result<SynthesisResult> {
        if let Some(engine) = options.engine.as_deref() {
            if engine != "builtin" {
                return Err(Error::Unsupported(format!(
                    "unknown synthesis engine '{engine}'"
                )));
            }
        }
        let voice = options.voice.clone().unwrap_or_else(|| BUILTIN_VOICE.to_string());

        let segments = input.into_segments();
        let total_segments = segments.len();
        let mut all_samples: Vec<f32> = Vec::new();
        let mut timeline: Vec<TimelineEntry> = Vec::new();
        let mut cursor = 0.0f64;

        for (segment_index, segment) in segments.iter().enumerate() {
            token.bail_if_canceled()?;

            let sentences = split_sentences(segment);
            let segment_start = cursor;
            let mut segment_samples: Vec<f32> = Vec::new();
            let mut sentence_entries: Vec<TimelineEntry> = Vec::new();

            for (sentence_index, sentence) in sentences.iter().enumerate() {
                token.bail_if_canceled()?;

                let samples = self.render_sentence(sentence, options.speed);
                let duration = samples.len() as f64 / self.sample_rate as f64;
                let entry =
                    TimelineEntry::new("sentence", sentence.clone(), cursor, cursor + duration);
                sentence_entries.push(entry.clone());

                progress.sentence(SynthesisEventData {
                    index: sentence_index,
                    total: Some(sentences.len()),
                    transcript: sentence.clone(),
                    timeline: vec![entry],
                    audio: Some(AudioPayload::Raw(RawAudio {
                        sample_rate: self.sample_rate,
                        channels: 1,
                        samples: samples.clone(),
                    })),
                });

                cursor += duration;
                segment_samples.extend_from_slice(&samples);

                // Suspension point between sentences, so a cancellation
                // mark set mid-job gets observed promptly.
                tokio::task::yield_now().await;
            }

            let mut segment_entry =
                TimelineEntry::new("segment", segment.clone(), segment_start, cursor);
            segment_entry.children = sentence_entries;
            timeline.push(segment_entry.clone());

            progress.segment(SynthesisEventData {
                index: segment_index,
                total: Some(total_segments),
                transcript: segment.clone(),
                timeline: vec![segment_entry],
                audio: Some(AudioPayload::Raw(RawAudio {
                    sample_rate: self.sample_rate,
                    channels: 1,
                    samples: segment_samples.clone(),
                })),
            });

            all_samples.extend_from_slice(&segment_samples);
        }

        token.bail_if_canceled()?;

        let raw = RawAudio {
            sample_rate: self.sample_rate,
            channels: 1,
            samples: all_samples,
        };
        let audio = match options.output_audio_format.as_deref() {
            Some(format) => {
                debug!(format, "transcoding synthesis result");
                let encoded = self
                    .transcoder
                    .encode_raw(&raw, &TranscodeOptions::format(format))
                    .await?;
                AudioPayload::Encoded(encoded)
            }
            None => AudioPayload::Raw(raw),
        };

        Ok(SynthesisResult {
            audio,
            timeline,
            language: options.language.clone(),
            voice: Some(voice),
        })
    }

    async fn voice_list(
        &self,
        options: VoiceListOptions,
        _token: &CancellationToken,
    ) -> Result<VoiceListResult> {
        let mut voices = vec![VoiceInfo {
            name: BUILTIN_VOICE.to_string(),
            languages: vec!["en".to_string()],
            gender: None,
        }];

        // Installed voice packages show up alongside the built-in voice.
        for package in self.packages.installed() {
            if let Some(name) = package.strip_prefix("voice-") {
                voices.push(VoiceInfo {
                    name: name.to_string(),
                    languages: Vec::new(),
                    gender: None,
                });
            }
        }

        if let Some(language) = &options.language {
            voices.retain(|voice| {
                voice.languages.is_empty() || voice.languages.iter().any(|l| l == language)
            });
        }

        Ok(VoiceListResult { voices })
    }

    async fn recognize(
        &self,
        _input: AudioSource,
        options: RecognitionOptions,
        _token: &CancellationToken,
    ) -> Result<RecognitionResult> {
        Err(self.model_gap("recognition", options.engine.as_deref()).await)
    }

    async fn align(
        &self,
        input: AudioSource,
        transcript: String,
        _options: AlignmentOptions,
        token: &CancellationToken,
    ) -> Result<AlignmentResult> {
        let raw = self.load_audio(input).await?;
        token.bail_if_canceled()?;

        let words: Vec<&str> = transcript.split_whitespace().collect();
        if words.is_empty() {
            return Err(Error::InvalidInput("transcript contains no words".into()));
        }

        // Uniform distribution over the audio duration, weighted by word
        // length so longer words get proportionally longer spans.
        let duration = raw.duration_secs();
        let total_chars: usize = words.iter().map(|word| word.chars().count()).sum();
        let per_char = duration / total_chars.max(1) as f64;

        let mut timeline = Vec::with_capacity(words.len());
        let mut cursor = 0.0f64;
        for word in &words {
            let span = word.chars().count() as f64 * per_char;
            timeline.push(TimelineEntry::new("word", *word, cursor, cursor + span));
            cursor += span;
        }

        Ok(AlignmentResult {
            timeline,
            input_raw_audio: Some(raw),
        })
    }

    async fn translate_speech(
        &self,
        _input: AudioSource,
        options: SpeechTranslationOptions,
        _token: &CancellationToken,
    ) -> Result<SpeechTranslationResult> {
        Err(self
            .model_gap("speech translation", options.engine.as_deref())
            .await)
    }

    async fn detect_speech_language(
        &self,
        _input: AudioSource,
        options: SpeechLanguageDetectionOptions,
        _token: &CancellationToken,
    ) -> Result<SpeechLanguageDetectionResult> {
        Err(self
            .model_gap("speech language detection", options.engine.as_deref())
            .await)
    }

    async fn detect_text_language(
        &self,
        input: String,
        options: TextLanguageDetectionOptions,
        _token: &CancellationToken,
    ) -> Result<TextLanguageDetectionResult> {
        let results = script_probabilities(&input);
        let detected_language = match results.first() {
            // Latin text is ambiguous between many languages, so the
            // caller's default wins there.
            Some(top) if top.language != "en" => top.language.clone(),
            Some(_) => options.default_language.clone(),
            None => options.default_language.clone(),
        };

        Ok(TextLanguageDetectionResult {
            detected_language,
            results,
        })
    }
}

/// Split text into sentences on terminal punctuation. A trailing
/// fragment without punctuation is kept as its own sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Rank likely languages by the dominant Unicode script of the input.
fn script_probabilities(text: &str) -> Vec<LanguageProbability> {
    let mut counts: [(&str, usize); 8] = [
        ("en", 0),
        ("ru", 0),
        ("zh", 0),
        ("ja", 0),
        ("ko", 0),
        ("ar", 0),
        ("he", 0),
        ("el", 0),
    ];
    let mut total = 0usize;

    for ch in text.chars() {
        if !ch.is_alphabetic() {
            continue;
        }
        total += 1;
        let slot = match ch {
            'a'..='z' | 'A'..='Z' | '\u{00C0}'..='\u{024F}' => 0,
            '\u{0400}'..='\u{04FF}' => 1,
            '\u{4E00}'..='\u{9FFF}' => 2,
            '\u{3040}'..='\u{30FF}' => 3,
            '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' => 4,
            '\u{0600}'..='\u{06FF}' => 5,
            '\u{0590}'..='\u{05FF}' => 6,
            '\u{0370}'..='\u{03FF}' => 7,
            _ => continue,
        };
        counts[slot].1 += 1;
    }

    if total == 0 {
        return Vec::new();
    }

    let mut results: Vec<LanguageProbability> = counts
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(language, count)| LanguageProbability {
            language: language.to_string(),
            probability: *count as f32 / total as f32,
        })
        .collect();
    results.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    results
}
