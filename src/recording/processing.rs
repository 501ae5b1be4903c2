// Take processing - decode, normalize, force stereo, resample, pad
//
// Runs once per finished take, off the playback path.

use crate::config::RecordingConfig;
use crate::recording::alignment::padding_frames;
use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use std::io::Cursor;

const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Unsupported take format: {0}")]
    Unsupported(String),

    #[error("Take contains no audio track")]
    NoAudioTrack,

    #[error("Failed to decode take: {0}")]
    Decode(String),

    #[error("Take is empty")]
    Empty,

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),
}

/// Planar decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// One Vec per channel, equal lengths
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// True peak across every channel
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Stereo take ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTake {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
    /// Silence frames prepended for alignment
    pub padding_frames: usize,
    /// Normalization gain that was applied
    pub gain: f32,
}

impl ProcessedTake {
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode captured bytes with symphonia
pub fn decode(bytes: &[u8], format_hint: Option<&str>) -> Result<DecodedAudio, ProcessingError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = format_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ProcessingError::Unsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or(ProcessingError::NoAudioTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| ProcessingError::Unsupported(e.to_string()))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut channel_count = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut channels: Vec<Vec<f32>> = vec![Vec::new(); channel_count];

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(ProcessingError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in take: {}", e);
                continue;
            }
            Err(e) => return Err(ProcessingError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        if channels.is_empty() {
            channel_count = spec.channels.count();
            channels = vec![Vec::new(); channel_count];
        }
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        for frame in buffer.samples().chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
    }

    let audio = DecodedAudio {
        channels,
        sample_rate,
    };
    if audio.channel_count() == 0 || audio.frames() == 0 || audio.sample_rate == 0 {
        return Err(ProcessingError::Empty);
    }
    Ok(audio)
}

/// Scale so the true peak lands on `target`
///
/// Silent takes and takes already peaking at or above `skip_threshold` are left
/// alone. Returns the applied gain.
pub fn normalize_peak(audio: &mut DecodedAudio, target: f32, skip_threshold: f32) -> f32 {
    let peak = audio.peak();
    if peak <= 0.0 || peak >= skip_threshold {
        return 1.0;
    }
    let gain = target / peak;
    for channel in &mut audio.channels {
        for sample in channel.iter_mut() {
            *sample *= gain;
        }
    }
    gain
}

/// Force a two-channel layout
///
/// - mono: duplicated to both sides
/// - stereo: left duplicated to the right (single microphone on a stereo interface)
/// - more: even channels averaged to the left, odd ones to the right
pub fn to_stereo(audio: &DecodedAudio) -> Result<(Vec<f32>, Vec<f32>), ProcessingError> {
    match audio.channels.as_slice() {
        [] => Err(ProcessingError::Empty),
        [mono] => Ok((mono.clone(), mono.clone())),
        [left, _right] => Ok((left.clone(), left.clone())),
        many => {
            let frames = audio.frames();
            let mix = |parity: usize| -> Vec<f32> {
                let group: Vec<&Vec<f32>> = many.iter().skip(parity).step_by(2).collect();
                let scale = 1.0 / group.len() as f32;
                (0..frames)
                    .map(|i| group.iter().map(|c| c[i]).sum::<f32>() * scale)
                    .collect()
            };
            Ok((mix(0), mix(1)))
        }
    }
}

/// Convert a stereo pair to another sample rate (FFT fixed-input resampler)
pub fn resample_stereo(
    left: &[f32],
    right: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<(Vec<f32>, Vec<f32>), ProcessingError> {
    if source_rate == target_rate || left.is_empty() {
        return Ok((left.to_vec(), right.to_vec()));
    }
    if left.len() != right.len() {
        return Err(ProcessingError::Resample(
            "left and right channels differ in length".to_string(),
        ));
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        RESAMPLE_SUB_CHUNKS,
        2,
    )
    .map_err(|e| ProcessingError::Resample(e.to_string()))?;

    let expected =
        (left.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut out_left = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
    let mut out_right = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut pos = 0;
    // Keep feeding (zero padded past the end) until the delayed tail is out
    while out_left.len() < expected + delay {
        let needed = resampler.input_frames_next();
        let mut chunk_left = vec![0.0f32; needed];
        let mut chunk_right = vec![0.0f32; needed];
        if pos < left.len() {
            let n = needed.min(left.len() - pos);
            chunk_left[..n].copy_from_slice(&left[pos..pos + n]);
            chunk_right[..n].copy_from_slice(&right[pos..pos + n]);
        }
        pos += needed;

        let input = vec![chunk_left, chunk_right];
        let output = resampler
            .process(&input, None)
            .map_err(|e| ProcessingError::Resample(e.to_string()))?;
        out_left.extend_from_slice(&output[0]);
        out_right.extend_from_slice(&output[1]);
    }

    out_left.drain(..delay);
    out_right.drain(..delay);
    out_left.truncate(expected);
    out_right.truncate(expected);
    Ok((out_left, out_right))
}

/// Prepend `frames` of silence to every channel
pub fn prepend_silence(channel: &mut Vec<f32>, frames: usize) {
    if frames == 0 {
        return;
    }
    channel.splice(0..0, std::iter::repeat_n(0.0, frames));
}

/// Full pipeline for one captured take aligned at `offset_seconds`
pub fn process_take(
    bytes: &[u8],
    format_hint: Option<&str>,
    offset_seconds: f64,
    config: &RecordingConfig,
) -> Result<ProcessedTake, ProcessingError> {
    let mut audio = decode(bytes, format_hint)?;
    log::debug!(
        "Decoded take: {} frames, {} channel(s) at {} Hz",
        audio.frames(),
        audio.channel_count(),
        audio.sample_rate
    );

    let gain = normalize_peak(
        &mut audio,
        config.normalize_target,
        config.normalize_skip_threshold,
    );
    let (left, right) = to_stereo(&audio)?;
    let (mut left, mut right) =
        resample_stereo(&left, &right, audio.sample_rate, config.sample_rate)?;

    let padding = padding_frames(offset_seconds, config.sample_rate);
    prepend_silence(&mut left, padding);
    prepend_silence(&mut right, padding);

    Ok(ProcessedTake {
        left,
        right,
        sample_rate: config.sample_rate,
        padding_frames: padding,
        gain,
    })
}
