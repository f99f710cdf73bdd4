//! Client-to-server envelope types.

use serde::{Deserialize, Serialize};

/// A decoded inbound envelope.
///
/// `request_id` is deliberately not required by the decoder: an envelope
/// that decodes but carries no id is dropped by the gateway with a log
/// line, it is not a transport error. Uniqueness of ids is assumed, not
/// enforced; a repeated id overwrites routing state for the earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "requestId", default)]
    pub request_id: String,

    #[serde(flatten)]
    pub body: RequestBody,
}

impl RequestEnvelope {
    pub fn new(request_id: impl Into<String>, body: RequestBody) -> Self {
        Self {
            request_id: request_id.into(),
            body,
        }
    }

    /// Whether this envelope is the cancellation signal rather than a job.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.body, RequestBody::CancellationRequest {})
    }

    /// Human-readable operation name, for logging.
    pub fn operation_name(&self) -> &'static str {
        match self.body {
            RequestBody::SynthesisRequest { .. } => "SynthesisRequest",
            RequestBody::VoiceListRequest { .. } => "VoiceListRequest",
            RequestBody::RecognitionRequest { .. } => "RecognitionRequest",
            RequestBody::AlignmentRequest { .. } => "AlignmentRequest",
            RequestBody::SpeechTranslationRequest { .. } => "SpeechTranslationRequest",
            RequestBody::SpeechLanguageDetectionRequest { .. } => "SpeechLanguageDetectionRequest",
            RequestBody::TextLanguageDetectionRequest { .. } => "TextLanguageDetectionRequest",
            RequestBody::CancellationRequest {} => "CancellationRequest",
        }
    }
}

/// Operation-specific request payload, tagged on the wire by `messageType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum RequestBody {
    SynthesisRequest {
        input: SynthesisInput,
        #[serde(default)]
        options: SynthesisOptions,
    },
    VoiceListRequest {
        #[serde(default)]
        options: VoiceListOptions,
    },
    RecognitionRequest {
        input: AudioSource,
        #[serde(default)]
        options: RecognitionOptions,
    },
    AlignmentRequest {
        input: AudioSource,
        transcript: String,
        #[serde(default)]
        options: AlignmentOptions,
    },
    SpeechTranslationRequest {
        input: AudioSource,
        #[serde(default)]
        options: SpeechTranslationOptions,
    },
    SpeechLanguageDetectionRequest {
        input: AudioSource,
        #[serde(default)]
        options: SpeechLanguageDetectionOptions,
    },
    TextLanguageDetectionRequest {
        input: String,
        #[serde(default)]
        options: TextLanguageDetectionOptions,
    },
    CancellationRequest {},
}

/// Text input for synthesis: a single string or pre-split segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SynthesisInput {
    Text(String),
    Segments(Vec<String>),
}

impl SynthesisInput {
    /// Normalize to a segment list.
    pub fn into_segments(self) -> Vec<String> {
        match self {
            SynthesisInput::Text(text) => vec![text],
            SynthesisInput::Segments(segments) => segments,
        }
    }
}

/// Audio input: a file path/URL, or an encoded audio blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioSource {
    Path(String),
    Encoded(#[serde(with = "serde_bytes")] Vec<u8>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisOptions {
    /// Synthesis engine to use. `None` selects the built-in default.
    #[serde(default)]
    pub engine: Option<String>,

    #[serde(default)]
    pub voice: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    /// Speed factor (1.0 = normal).
    #[serde(default = "default_speed")]
    pub speed: f32,

    /// When set, the result audio is transcoded to this container format
    /// (e.g. `wav`, `mp3`) instead of returned as raw samples.
    #[serde(default)]
    pub output_audio_format: Option<String>,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            engine: None,
            voice: None,
            language: None,
            speed: default_speed(),
            output_audio_format: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceListOptions {
    #[serde(default)]
    pub engine: Option<String>,

    /// Restrict the list to voices supporting this language.
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionOptions {
    #[serde(default)]
    pub engine: Option<String>,

    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentOptions {
    #[serde(default)]
    pub engine: Option<String>,

    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechTranslationOptions {
    #[serde(default)]
    pub engine: Option<String>,

    #[serde(default)]
    pub source_language: Option<String>,

    #[serde(default = "default_language")]
    pub target_language: String,
}

impl Default for SpeechTranslationOptions {
    fn default() -> Self {
        Self {
            engine: None,
            source_language: None,
            target_language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechLanguageDetectionOptions {
    #[serde(default)]
    pub engine: Option<String>,

    /// Language reported when detection is inconclusive.
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for SpeechLanguageDetectionOptions {
    fn default() -> Self {
        Self {
            engine: None,
            default_language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLanguageDetectionOptions {
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for TextLanguageDetectionOptions {
    fn default() -> Self {
        Self {
            default_language: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}
