//! # Microphone Capture
//!
//! Records from the default system input device via cpal. The device's
//! native format is accepted and converted: samples become 16-bit signed
//! integers and multi-channel frames are averaged down to mono, which is
//! what the speech recognition service expects.

use crate::config::AudioConfig;
use byteorder::{LittleEndian, WriteBytesExt};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, SupportedStreamConfig};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Errors raised while capturing from the microphone.
#[derive(Debug)]
pub enum CaptureError {
    /// No usable input device, or the device refused its configuration
    Device(String),

    /// The input stream could not be built or started
    Stream(String),

    /// The device produces a sample format we do not convert
    UnsupportedFormat(String),

    /// WAV encoding failed
    Wav(String),

    /// Filesystem problems while writing the transient WAV file
    Io(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Device(msg) => write!(f, "audio device error: {}", msg),
            CaptureError::Stream(msg) => write!(f, "audio stream error: {}", msg),
            CaptureError::UnsupportedFormat(msg) => {
                write!(f, "unsupported audio format: {}", msg)
            }
            CaptureError::Wav(msg) => write!(f, "wav encoding error: {}", msg),
            CaptureError::Io(msg) => write!(f, "audio file error: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

/// A finished mono recording.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl RecordedAudio {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Raw 16-bit little-endian PCM, the body format for the speech API.
    pub fn pcm_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for &sample in &self.samples {
            // Writing into a Vec cannot fail.
            let _ = bytes.write_i16::<LittleEndian>(sample);
        }
        bytes
    }

    /// The recording as a complete in-memory WAV file.
    pub fn wav_bytes(&self) -> Result<Vec<u8>, CaptureError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| CaptureError::Wav(e.to_string()))?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| CaptureError::Wav(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| CaptureError::Wav(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }

    /// Write the take to a transient WAV file under the system temp
    /// directory and return its path. The file is kept on disk; the OS temp
    /// cleanup owns its lifetime.
    pub fn write_temp_wav(&self) -> Result<PathBuf, CaptureError> {
        let bytes = self.wav_bytes()?;

        let file = tempfile::Builder::new()
            .prefix("consult-capture-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| CaptureError::Io(e.to_string()))?;

        std::fs::write(file.path(), &bytes).map_err(|e| CaptureError::Io(e.to_string()))?;

        let (_file, path) = file
            .keep()
            .map_err(|e| CaptureError::Io(e.to_string()))?;

        debug!("Wrote {} byte capture to {:?}", bytes.len(), path);
        Ok(path)
    }
}

/// Blocking microphone recorder over the default input device.
pub struct MicrophoneRecorder {
    requested: AudioConfig,
}

impl MicrophoneRecorder {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            requested: config.clone(),
        }
    }

    /// Record for a fixed duration. Blocks the calling thread.
    pub fn record_for(&self, duration: Duration) -> Result<RecordedAudio, CaptureError> {
        self.record_inner(duration, None)
    }

    /// Record until `stop` is raised, bounded by `max_duration`.
    ///
    /// This is the server-side analog of interrupting a live recording: the
    /// flag comes from whoever owns the run, the bound keeps an abandoned
    /// run from holding the device forever.
    pub fn record_until(
        &self,
        stop: Arc<AtomicBool>,
        max_duration: Duration,
    ) -> Result<RecordedAudio, CaptureError> {
        self.record_inner(max_duration, Some(stop))
    }

    fn record_inner(
        &self,
        duration: Duration,
        stop: Option<Arc<AtomicBool>>,
    ) -> Result<RecordedAudio, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::Device("no default input device found".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let supported = self.select_input_config(&device)?;
        let channels = supported.config().channels;
        let sample_rate = supported.config().sample_rate.0;

        info!(
            "Recording from '{}' at {} Hz, {} channel(s)",
            device_name, sample_rate, channels
        );

        let samples: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
        let stream = build_capture_stream(&device, &supported, samples.clone())?;

        stream
            .play()
            .map_err(|e| CaptureError::Stream(format!("failed to start capture: {}", e)))?;

        let started = Instant::now();
        loop {
            std::thread::sleep(Duration::from_millis(50));

            if started.elapsed() >= duration {
                break;
            }
            if let Some(flag) = &stop {
                if flag.load(Ordering::SeqCst) {
                    debug!("Stop flag raised after {:.1}s", started.elapsed().as_secs_f64());
                    break;
                }
            }
        }

        // Dropping the stream ends the capture callback.
        drop(stream);

        let interleaved = samples
            .lock()
            .map_err(|_| CaptureError::Stream("capture buffer lock poisoned".to_string()))?
            .split_off(0);

        if interleaved.is_empty() {
            warn!("Capture from '{}' produced no samples", device_name);
        }

        let mono = downmix_to_mono(&interleaved, channels);
        Ok(RecordedAudio::new(mono, sample_rate))
    }

    /// Prefer a device mode matching the configured rate and channel count;
    /// otherwise take whatever the device calls its default.
    fn select_input_config(
        &self,
        device: &cpal::Device,
    ) -> Result<SupportedStreamConfig, CaptureError> {
        if let Ok(ranges) = device.supported_input_configs() {
            for range in ranges {
                if range.channels() != self.requested.channels {
                    continue;
                }
                if let Some(exact) =
                    range.try_with_sample_rate(cpal::SampleRate(self.requested.sample_rate))
                {
                    return Ok(exact);
                }
            }
        }

        device.default_input_config().map_err(|e| {
            CaptureError::Device(format!("failed to resolve default input config: {}", e))
        })
    }
}

/// Average interleaved frames down to a single channel.
///
/// A trailing partial frame (a device delivering a buffer that is not a
/// multiple of the channel count) is dropped.
fn downmix_to_mono(interleaved: &[i16], channels: u16) -> Vec<i16> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

fn build_capture_stream(
    device: &cpal::Device,
    supported: &SupportedStreamConfig,
    samples: Arc<Mutex<Vec<i16>>>,
) -> Result<Stream, CaptureError> {
    let stream_config = supported.config();

    match supported.sample_format() {
        SampleFormat::I8 => build_input_stream::<i8>(device, &stream_config, samples),
        SampleFormat::I16 => build_input_stream::<i16>(device, &stream_config, samples),
        SampleFormat::I32 => build_input_stream::<i32>(device, &stream_config, samples),
        SampleFormat::U8 => build_input_stream::<u8>(device, &stream_config, samples),
        SampleFormat::U16 => build_input_stream::<u16>(device, &stream_config, samples),
        SampleFormat::U32 => build_input_stream::<u32>(device, &stream_config, samples),
        SampleFormat::F32 => build_input_stream::<f32>(device, &stream_config, samples),
        SampleFormat::F64 => build_input_stream::<f64>(device, &stream_config, samples),
        other => Err(CaptureError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn build_input_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    samples: Arc<Mutex<Vec<i16>>>,
) -> Result<Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample,
    i16: cpal::FromSample<T>,
{
    let callback = move |data: &[T], _info: &cpal::InputCallbackInfo| {
        if let Ok(mut buffer) = samples.lock() {
            for &sample in data {
                let converted: i16 = cpal::Sample::from_sample(sample);
                buffer.push(converted);
            }
        }
    };

    let error_callback = |error: cpal::StreamError| {
        tracing::error!("cpal stream error: {}", error);
    };

    device
        .build_input_stream(stream_config, callback, error_callback, None)
        .map_err(|e| CaptureError::Stream(format!("failed to build input stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_bytes_little_endian() {
        let audio = RecordedAudio::new(vec![0x0102, -2], 16000);
        assert_eq!(audio.pcm_bytes(), vec![0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn test_wav_round_trip() {
        let original = vec![0i16, 1000, -1000, i16::MAX, i16::MIN];
        let audio = RecordedAudio::new(original.clone(), 16000);

        let bytes = audio.wav_bytes().unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();

        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16000);

        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_downmix_stereo() {
        let interleaved = vec![100, 200, -100, 100, 7];
        // The trailing partial frame (7) is dropped.
        assert_eq!(downmix_to_mono(&interleaved, 2), vec![150, 0]);
    }

    #[test]
    fn test_downmix_mono_is_identity() {
        let interleaved = vec![1, 2, 3];
        assert_eq!(downmix_to_mono(&interleaved, 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_duration() {
        let audio = RecordedAudio::new(vec![0; 32000], 16000);
        assert_eq!(audio.duration_seconds(), 2.0);
        assert!(!audio.is_empty());
        assert!(RecordedAudio::new(Vec::new(), 16000).is_empty());
    }
}
