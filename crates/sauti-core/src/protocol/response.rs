//! Server-to-client envelope types.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An outbound envelope: one progress or terminal event for a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "requestId")]
    pub request_id: String,

    #[serde(flatten)]
    pub body: ResponseBody,
}

impl ResponseEnvelope {
    pub fn new(request_id: impl Into<String>, body: ResponseBody) -> Self {
        Self {
            request_id: request_id.into(),
            body,
        }
    }

    /// Build the error terminal event for a failed or canceled job.
    pub fn from_error(request_id: impl Into<String>, error: &Error) -> Self {
        Self::new(
            request_id,
            ResponseBody::Error {
                error: ErrorDetail {
                    message: error.to_string(),
                    canceled: error.is_cancellation(),
                },
            },
        )
    }

    /// The wire projection of this event.
    ///
    /// Fields meaningful only in-process (decoded raw audio of the request
    /// input) are stripped before transmission. In-process consumers read
    /// the canonical value directly and never see this projection.
    pub fn to_wire(&self) -> Self {
        let mut wire = self.clone();
        match &mut wire.body {
            ResponseBody::RecognitionResponse(result) => result.input_raw_audio = None,
            ResponseBody::AlignmentResponse(result) => result.input_raw_audio = None,
            ResponseBody::SpeechTranslationResponse(result) => result.input_raw_audio = None,
            ResponseBody::SpeechLanguageDetectionResponse(result) => {
                result.input_raw_audio = None
            }
            _ => {}
        }
        wire
    }

    pub fn message_type(&self) -> &'static str {
        match self.body {
            ResponseBody::SynthesisResponse(_) => "SynthesisResponse",
            ResponseBody::SynthesisSegmentEvent(_) => "SynthesisSegmentEvent",
            ResponseBody::SynthesisSentenceEvent(_) => "SynthesisSentenceEvent",
            ResponseBody::VoiceListResponse(_) => "VoiceListResponse",
            ResponseBody::RecognitionResponse(_) => "RecognitionResponse",
            ResponseBody::AlignmentResponse(_) => "AlignmentResponse",
            ResponseBody::SpeechTranslationResponse(_) => "SpeechTranslationResponse",
            ResponseBody::SpeechLanguageDetectionResponse(_) => "SpeechLanguageDetectionResponse",
            ResponseBody::TextLanguageDetectionResponse(_) => "TextLanguageDetectionResponse",
            ResponseBody::Error { .. } => "Error",
        }
    }
}

/// Operation-specific response payload, tagged on the wire by `messageType`.
///
/// `SynthesisSegmentEvent` and `SynthesisSentenceEvent` are the only
/// progress kinds; everything else is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum ResponseBody {
    SynthesisResponse(SynthesisResult),
    SynthesisSegmentEvent(SynthesisEventData),
    SynthesisSentenceEvent(SynthesisEventData),
    VoiceListResponse(VoiceListResult),
    RecognitionResponse(RecognitionResult),
    AlignmentResponse(AlignmentResult),
    SpeechTranslationResponse(SpeechTranslationResult),
    SpeechLanguageDetectionResponse(SpeechLanguageDetectionResult),
    TextLanguageDetectionResponse(TextLanguageDetectionResult),
    Error { error: ErrorDetail },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,

    /// Set when the failure was a cooperative cancellation rather than a
    /// genuine error.
    #[serde(default)]
    pub canceled: bool,
}

/// Decoded mono audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAudio {
    pub sample_rate: u32,
    pub channels: u32,
    pub samples: Vec<f32>,
}

impl RawAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Result audio: raw samples, or an encoded container when the request
/// asked for a specific output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioPayload {
    Raw(RawAudio),
    Encoded(#[serde(with = "serde_bytes")] Vec<u8>),
}

/// One entry of a time-aligned transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    #[serde(rename = "type")]
    pub entry_type: String,

    pub text: String,
    pub start_time: f64,
    pub end_time: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TimelineEntry>,
}

impl TimelineEntry {
    pub fn new(
        entry_type: impl Into<String>,
        text: impl Into<String>,
        start_time: f64,
        end_time: f64,
    ) -> Self {
        Self {
            entry_type: entry_type.into(),
            text: text.into(),
            start_time,
            end_time,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    pub audio: AudioPayload,
    pub timeline: Vec<TimelineEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// Payload of a synthesis progress event, one per completed segment or
/// sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisEventData {
    /// Zero-based index of the finished unit.
    pub index: usize,

    /// Total number of units of this kind, when known up front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,

    pub transcript: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<TimelineEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceListResult {
    pub voices: Vec<VoiceInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    pub name: String,
    pub languages: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub transcript: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<TimelineEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_raw_audio: Option<RawAudio>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentResult {
    pub timeline: Vec<TimelineEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_raw_audio: Option<RawAudio>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechTranslationResult {
    pub transcript: String,
    pub translated_transcript: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,

    pub target_language: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<TimelineEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_raw_audio: Option<RawAudio>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechLanguageDetectionResult {
    pub detected_language: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<LanguageProbability>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_raw_audio: Option<RawAudio>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLanguageDetectionResult {
    pub detected_language: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<LanguageProbability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageProbability {
    pub language: String,
    pub probability: f32,
}
