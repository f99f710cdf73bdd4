//! Audio transcoding through an external ffmpeg executable.
//!
//! Input bytes are streamed over stdin and the transcoded result is read
//! from stdout, so no temporary files are involved.

use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::response::RawAudio;

/// Output parameters for a transcode invocation.
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Container format passed to `-f` (e.g. `wav`, `mp3`, `ogg`).
    pub format: String,
    pub codec: Option<String>,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

impl TranscodeOptions {
    pub fn format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            codec: None,
            bitrate_kbps: None,
            sample_rate: None,
            channels: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Transcode encoded audio to the requested output format.
    pub async fn transcode(&self, input: &[u8], options: &TranscodeOptions) -> Result<Vec<u8>> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            "pipe:0".into(),
        ];
        if let Some(codec) = &options.codec {
            args.push("-c:a".into());
            args.push(codec.clone());
        }
        if let Some(bitrate) = options.bitrate_kbps {
            args.push("-b:a".into());
            args.push(format!("{bitrate}k"));
        }
        if let Some(sample_rate) = options.sample_rate {
            args.push("-ar".into());
            args.push(sample_rate.to_string());
        }
        if let Some(channels) = options.channels {
            args.push("-ac".into());
            args.push(channels.to_string());
        }
        args.push("-f".into());
        args.push(options.format.clone());
        args.push("pipe:1".into());

        self.run(input, &args).await
    }

    /// Encode raw mono f32 samples into the requested output format.
    pub async fn encode_raw(&self, audio: &RawAudio, options: &TranscodeOptions) -> Result<Vec<u8>> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "f32le".into(),
            "-ar".into(),
            audio.sample_rate.to_string(),
            "-ac".into(),
            audio.channels.to_string(),
            "-i".into(),
            "pipe:0".into(),
        ];
        if let Some(codec) = &options.codec {
            args.push("-c:a".into());
            args.push(codec.clone());
        }
        if let Some(bitrate) = options.bitrate_kbps {
            args.push("-b:a".into());
            args.push(format!("{bitrate}k"));
        }
        args.push("-f".into());
        args.push(options.format.clone());
        args.push("pipe:1".into());

        let input: Vec<u8> = audio
            .samples
            .iter()
            .flat_map(|sample| sample.to_le_bytes())
            .collect();
        self.run(&input, &args).await
    }

    /// Decode any supported input to mono f32 samples at `sample_rate`.
    pub async fn decode_to_raw(&self, input: &[u8], sample_rate: u32) -> Result<RawAudio> {
        let args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            "pipe:0".into(),
            "-ac".into(),
            "1".into(),
            "-ar".into(),
            sample_rate.to_string(),
            "-f".into(),
            "f32le".into(),
            "pipe:1".into(),
        ];

        let bytes = self.run(input, &args).await?;
        let samples = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(RawAudio {
            sample_rate,
            channels: 1,
            samples,
        })
    }

    async fn run(&self, input: &[u8], args: &[String]) -> Result<Vec<u8>> {
        debug!(ffmpeg = %self.ffmpeg_path, ?args, "invoking transcoder");

        let mut child = tokio::process::Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Transcode(format!("failed to start ffmpeg: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transcode("ffmpeg stdin unavailable".into()))?;
        let input = input.to_vec();
        let writer = tokio::spawn(async move {
            // A write error here surfaces as a short/failed read below.
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        });

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transcode("ffmpeg stdout unavailable".into()))?;
        let mut output = Vec::new();
        stdout
            .read_to_end(&mut output)
            .await
            .map_err(|e| Error::Transcode(format!("reading ffmpeg output failed: {e}")))?;

        let mut stderr_text = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            let _ = stderr.read_to_string(&mut stderr_text).await;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Transcode(format!("waiting for ffmpeg failed: {e}")))?;
        let _ = writer.await;

        if !status.success() {
            return Err(Error::Transcode(format!(
                "ffmpeg exited with {status}: {}",
                stderr_text.trim()
            )));
        }

        Ok(output)
    }
}
