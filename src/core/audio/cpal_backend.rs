//! Microphone capture and speaker playback using cpal.
//!
//! `cpal::Stream` is `!Send`, so each stream lives on a dedicated thread that
//! owns it until it receives a stop signal. Devices run at whatever rate they
//! support; audio is converted to and from 24kHz with [`StreamResampler`].
//!
//! Playback keeps one output stream open for the life of the sink. Samples
//! reach its callback through a lock-free ring buffer, so consecutive
//! fragments play without gaps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedStreamConfig, SupportedStreamConfigRange,
};
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, error, info, warn};

use super::capture::{CaptureBackend, CaptureConfig, SampleHandler};
use super::playback::AudioSink;
use super::resample::StreamResampler;
use super::{AudioError, AudioResult, SAMPLE_RATE};

/// Output ring capacity, in seconds of device audio.
const OUTPUT_BUFFER_SECS: f32 = 0.5;

/// Poll interval while `play` waits for ring space.
const OUTPUT_WAIT: Duration = Duration::from_millis(5);

/// Pick a device configuration that can run at `sample_rate`, preferring
/// fewer channels and `f32` samples.
fn select_config(
    configs: Vec<SupportedStreamConfigRange>,
    sample_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    let rate = SampleRate(sample_rate);
    let mut candidates: Vec<_> = configs
        .into_iter()
        .filter(|c| c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
        .collect();
    candidates.sort_by_key(|c| (c.channels(), c.sample_format() != SampleFormat::F32));
    candidates.into_iter().next()
}

/// The configuration to open: one running at `sample_rate` natively if the
/// device has it, otherwise the device default.
fn choose_config(
    configs: Vec<SupportedStreamConfigRange>,
    sample_rate: u32,
    default: impl FnOnce() -> Result<SupportedStreamConfig, cpal::DefaultStreamConfigError>,
) -> AudioResult<SupportedStreamConfig> {
    if let Some(native) = select_config(configs, sample_rate) {
        return Ok(native.with_sample_rate(SampleRate(sample_rate)));
    }
    let fallback = default().map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;
    debug!(
        device_rate = fallback.sample_rate().0,
        target_rate = sample_rate,
        "Device lacks the session rate, resampling"
    );
    Ok(fallback)
}

/// Average interleaved channels down to mono.
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn build_input_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    mut handler: SampleHandler,
    mut resampler: StreamResampler,
    convert_fn: F,
) -> AudioResult<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    F: Fn(T) -> f32 + Send + 'static,
{
    let channels = config.channels as usize;
    let mut converted = Vec::new();
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let linear: Vec<f32> = data.iter().map(|&s| convert_fn(s)).collect();
                let mono = downmix(&linear, channels);
                converted.clear();
                if let Err(e) = resampler.process(&mono, &mut converted) {
                    error!("Dropping captured buffer: {}", e);
                    return;
                }
                if !converted.is_empty() {
                    handler(&converted);
                }
            },
            |err| error!("Audio input stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;
    Ok(stream)
}

struct StreamHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

/// Default-input-device capture.
///
/// Echo cancellation, noise suppression and gain control are requested
/// through [`CaptureConfig`] but cpal exposes no such processing, so they are
/// left to the platform's audio stack.
#[derive(Default)]
pub struct CpalCaptureBackend {
    handle: Option<StreamHandle>,
}

impl CpalCaptureBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureBackend for CpalCaptureBackend {
    fn open(&mut self, config: &CaptureConfig, on_samples: SampleHandler) -> AudioResult<()> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<AudioResult<()>>();
        let sample_rate = config.sample_rate;

        info!(
            echo_cancellation = config.echo_cancellation,
            noise_suppression = config.noise_suppression,
            auto_gain_control = config.auto_gain_control,
            "Opening default input device"
        );

        let thread = std::thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let host = cpal::default_host();
                let Some(device) = host.default_input_device() else {
                    let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(
                        "no audio input device".to_string(),
                    )));
                    return;
                };

                let configs = match device.supported_input_configs() {
                    Ok(configs) => configs.collect(),
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(e.to_string())));
                        return;
                    }
                };

                let supported =
                    match choose_config(configs, sample_rate, || device.default_input_config()) {
                        Ok(supported) => supported,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                let sample_format = supported.sample_format();
                let stream_config: StreamConfig = supported.config();
                let resampler = match StreamResampler::new(stream_config.sample_rate.0, sample_rate) {
                    Ok(resampler) => resampler,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!(
                    device_rate = stream_config.sample_rate.0,
                    channels = stream_config.channels,
                    "Capturing from default input device"
                );
                macro_rules! handle_format {
                    ($sample_type:ty, $converter:expr) => {
                        build_input_stream::<$sample_type, _>(
                            &device,
                            &stream_config,
                            on_samples,
                            resampler,
                            $converter,
                        )
                    };
                }

                let stream_result = match sample_format {
                    SampleFormat::I16 => handle_format!(i16, |s| f32::from(s) / 32768.0),
                    SampleFormat::I32 => handle_format!(i32, |s| s as f32 / i32::MAX as f32),
                    SampleFormat::U16 => {
                        handle_format!(u16, |s| (f32::from(s) - 32768.0) / 32768.0)
                    }
                    SampleFormat::F32 => handle_format!(f32, |s| s),
                    SampleFormat::F64 => handle_format!(f64, |s| s as f32),
                    other => Err(AudioError::DeviceUnavailable(format!(
                        "unsupported sample format: {other:?}"
                    ))),
                };

                let _stream = match stream_result {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if stop_rx.recv().is_err() {
                    warn!("Audio capture stop channel closed");
                }
                info!("Audio capture thread exiting");
            })
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.handle = Some(StreamHandle {
                    stop_tx,
                    thread: Some(thread),
                });
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AudioError::DeviceUnavailable(
                "audio thread failed to start".to_string(),
            )),
        }
    }

    fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            let _ = handle.stop_tx.send(());
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

fn build_output_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: Consumer<f32>,
) -> AudioResult<cpal::Stream>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = config.channels as usize;
    let stream = device
        .build_output_stream(
            config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in output.chunks_mut(channels) {
                    // Underrun plays silence
                    let value = consumer.pop().unwrap_or(0.0);
                    frame.fill(T::from_sample(value));
                }
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;
    Ok(stream)
}

/// Push every sample into the ring in order, waiting while it is full.
fn feed_ring(producer: &mut Producer<f32>, samples: &[f32], closed: &AtomicBool) -> AudioResult<()> {
    let mut pending = samples;
    while !pending.is_empty() {
        if closed.load(Ordering::SeqCst) || producer.is_abandoned() {
            return Err(AudioError::Stream("output stream closed".to_string()));
        }
        let writable = producer.slots().min(pending.len());
        if writable == 0 {
            std::thread::sleep(OUTPUT_WAIT);
            continue;
        }
        for &sample in &pending[..writable] {
            let _ = producer.push(sample);
        }
        pending = &pending[writable..];
    }
    Ok(())
}

struct OutputFeed {
    producer: Producer<f32>,
    resampler: StreamResampler,
    converted: Vec<f32>,
}

/// Default-output-device playback through one persistent stream.
pub struct CpalAudioSink {
    feed: Mutex<OutputFeed>,
    closed: AtomicBool,
    handle: Mutex<Option<StreamHandle>>,
}

impl CpalAudioSink {
    pub fn new() -> AudioResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<AudioResult<(u32, Producer<f32>)>>();

        let thread = std::thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                let opened = (|| -> AudioResult<(cpal::Stream, u32, Producer<f32>)> {
                    let host = cpal::default_host();
                    let device = host.default_output_device().ok_or_else(|| {
                        AudioError::DeviceUnavailable("no audio output device".to_string())
                    })?;
                    let configs: Vec<_> = device
                        .supported_output_configs()
                        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
                        .collect();
                    let supported =
                        choose_config(configs, SAMPLE_RATE, || device.default_output_config())?;

                    let config: StreamConfig = supported.config();
                    let capacity = (config.sample_rate.0 as f32 * OUTPUT_BUFFER_SECS) as usize;
                    let (producer, consumer) = RingBuffer::<f32>::new(capacity.max(1));

                    let stream = match supported.sample_format() {
                        SampleFormat::F32 => build_output_stream::<f32>(&device, &config, consumer),
                        SampleFormat::I16 => build_output_stream::<i16>(&device, &config, consumer),
                        SampleFormat::U16 => build_output_stream::<u16>(&device, &config, consumer),
                        SampleFormat::I32 => build_output_stream::<i32>(&device, &config, consumer),
                        SampleFormat::F64 => build_output_stream::<f64>(&device, &config, consumer),
                        other => Err(AudioError::DeviceUnavailable(format!(
                            "unsupported sample format: {other:?}"
                        ))),
                    }?;
                    info!(
                        device_rate = config.sample_rate.0,
                        channels = config.channels,
                        "Playing to default output device"
                    );
                    Ok((stream, config.sample_rate.0, producer))
                })();

                let _stream = match opened {
                    Ok((stream, rate, producer)) => {
                        let _ = ready_tx.send(Ok((rate, producer)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if stop_rx.recv().is_err() {
                    warn!("Audio playback stop channel closed");
                }
                info!("Audio playback thread exiting");
            })
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let (device_rate, producer) = match ready_rx.recv() {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(AudioError::DeviceUnavailable(
                    "audio thread failed to start".to_string(),
                ));
            }
        };

        Ok(Self {
            feed: Mutex::new(OutputFeed {
                producer,
                resampler: StreamResampler::new(SAMPLE_RATE, device_rate)?,
                converted: Vec::new(),
            }),
            closed: AtomicBool::new(false),
            handle: Mutex::new(Some(StreamHandle {
                stop_tx,
                thread: Some(thread),
            })),
        })
    }
}

impl AudioSink for CpalAudioSink {
    /// Queue samples on the output stream, waiting only for ring space.
    fn play(&self, samples: &[f32]) -> AudioResult<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut feed = self.feed.lock();
        let OutputFeed {
            producer,
            resampler,
            converted,
        } = &mut *feed;
        converted.clear();
        resampler.process(samples, converted)?;

        feed_ring(producer, converted, &self.closed)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(mut handle) = self.handle.lock().take() {
            let _ = handle.stop_tx.send(());
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for CpalAudioSink {
    fn drop(&mut self) {
        self.close();
    }
}
