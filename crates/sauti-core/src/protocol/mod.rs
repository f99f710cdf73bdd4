//! Wire protocol contracts.
//!
//! Every meaningful frame on the duplex connection is a self-describing
//! MessagePack map tagged by a `messageType` field and carrying a
//! `requestId`. Request envelopes flow client to server, response
//! envelopes flow back; the same envelope types cross the execution
//! context boundary unchanged.

pub mod codec;
pub mod request;
pub mod response;

pub use codec::{decode_request, encode_response};
pub use request::{
    AlignmentOptions, AudioSource, RecognitionOptions, RequestBody, RequestEnvelope,
    SpeechLanguageDetectionOptions, SpeechTranslationOptions, SynthesisInput, SynthesisOptions,
    TextLanguageDetectionOptions, VoiceListOptions,
};
pub use response::{
    AlignmentResult, AudioPayload, ErrorDetail, LanguageProbability, RawAudio, RecognitionResult,
    ResponseBody, ResponseEnvelope, SpeechLanguageDetectionResult, SpeechTranslationResult,
    SynthesisEventData, SynthesisResult, TextLanguageDetectionResult, TimelineEntry, VoiceInfo,
    VoiceListResult,
};
