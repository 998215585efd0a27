//! Amplitude analysis
//!
//! Finds where a sample actually starts and how loud its first second is:
//!
//! 1. Rectify and smooth with a 100-frame moving average (only full windows).
//! 2. Onset = first smoothed value above 1/50 of the smoothed maximum.
//! 3. Offset = onset minus 100 frames, never below zero.
//! 4. Level = 95th percentile of the smoothed signal over one second from
//!    the onset; volume = `-10·log10(level²) - 4.5` dB. Stereo files sum the
//!    energy of both channels and take the onset from the right channel.
//!
//! Decoding needs the `analysis` feature (WAV files via `hound`).

use crate::error::{Error, Result};
use crate::layer::Layer;

/// Moving average width in frames
pub const SMOOTHING_WINDOW: usize = 100;

/// Onset threshold as a fraction of the smoothed maximum
pub const ONSET_DIVISOR: f64 = 50.0;

/// Frames kept before the detected onset
pub const PRE_ROLL: usize = 100;

pub const LEVEL_PERCENTILE: f64 = 95.0;

/// Headroom subtracted from every volume correction, in dB
pub const HEADROOM_DB: f64 = 4.5;

/// What analysis found for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analysis {
    /// Frames to skip at the start
    pub offset: u64,
    /// Volume correction in dB
    pub volume: f64,
    /// Always 0
    pub pan: f64,
}

/// Moving average over full windows only, `len - window + 1` values
pub fn moving_average(samples: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || samples.len() < window {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(samples.len() - window + 1);
    let mut sum: f64 = samples[..window].iter().sum();
    out.push(sum / window as f64);
    for i in window..samples.len() {
        sum += samples[i] - samples[i - window];
        out.push(sum / window as f64);
    }
    out
}

/// Percentile with linear interpolation between the closest ranks
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

fn smooth(channel: &[f64]) -> Result<Vec<f64>> {
    let rectified: Vec<f64> = channel.iter().map(|s| s.abs()).collect();
    let smooth = moving_average(&rectified, SMOOTHING_WINDOW);
    if smooth.is_empty() {
        return Err(Error::Analysis(format!(
            "sample shorter than {} frames",
            SMOOTHING_WINDOW
        )));
    }
    Ok(smooth)
}

fn onset(smooth: &[f64]) -> Result<usize> {
    let max = smooth.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return Err(Error::Analysis("sample is silent".to_string()));
    }
    let cutoff = max / ONSET_DIVISOR;
    smooth
        .iter()
        .position(|&v| v > cutoff)
        .ok_or_else(|| Error::Analysis("no onset found".to_string()))
}

/// 95th percentile of one second of smoothed signal starting at `onset`
fn level(smooth: &[f64], onset: usize, sample_rate: usize) -> Result<f64> {
    let end = smooth.len().min(onset + sample_rate);
    percentile(&smooth[onset..end], LEVEL_PERCENTILE)
        .ok_or_else(|| Error::Analysis("empty analysis window".to_string()))
}

fn correction(energy: f64) -> Result<f64> {
    if energy <= 0.0 {
        return Err(Error::Analysis("sample is silent after onset".to_string()));
    }
    Ok(-10.0 * energy.log10() - HEADROOM_DB)
}

pub fn analyze_mono(samples: &[f64], sample_rate: usize) -> Result<Analysis> {
    let smooth = smooth(samples)?;
    let onset = onset(&smooth)?;
    let level = level(&smooth, onset, sample_rate)?;

    Ok(Analysis {
        offset: onset.saturating_sub(PRE_ROLL) as u64,
        volume: correction(level * level)?,
        pan: 0.0,
    })
}

pub fn analyze_stereo(left: &[f64], right: &[f64], sample_rate: usize) -> Result<Analysis> {
    let smooth_left = smooth(left)?;
    let smooth_right = smooth(right)?;
    let onset = onset(&smooth_right)?;
    let level_left = level(&smooth_left, onset.min(smooth_left.len() - 1), sample_rate)?;
    let level_right = level(&smooth_right, onset, sample_rate)?;

    Ok(Analysis {
        offset: onset.saturating_sub(PRE_ROLL) as u64,
        volume: correction(level_left * level_left + level_right * level_right)?,
        pan: 0.0,
    })
}

/// Decoded audio, one vector per channel
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub channels: Vec<Vec<f64>>,
    pub sample_rate: u32,
}

#[cfg(feature = "analysis")]
pub fn decode_wav(path: &std::path::Path) -> Result<Decoded> {
    let decode_error = |e: hound::Error| Error::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let reader = hound::WavReader::open(path).map_err(decode_error)?;
    let spec = reader.spec();
    let channel_count = spec.channels.max(1) as usize;

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(decode_error)?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f64 / max_value))
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(decode_error)?
        }
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }

    Ok(Decoded {
        channels,
        sample_rate: spec.sample_rate,
    })
}

/// Analyze a decoded file; files with more than two channels use the first two
pub fn analyze_decoded(decoded: &Decoded) -> Result<Analysis> {
    let rate = decoded.sample_rate as usize;
    match decoded.channels.as_slice() {
        [] => Err(Error::Analysis("no audio channels".to_string())),
        [mono] => analyze_mono(mono, rate),
        [left, right, ..] => analyze_stereo(left, right, rate),
    }
}

#[cfg(feature = "analysis")]
pub fn analyze_file(path: &std::path::Path) -> Result<Analysis> {
    analyze_decoded(&decode_wav(path)?)
}

/// Analyze every sample of every layer that wants it.
///
/// Release layers and layers with `skipAnalysis` are left alone. A file
/// that can't be analyzed keeps its zero offset and volume.
pub fn analyze_layers(layers: &mut [Layer]) {
    let pending = layers
        .iter()
        .filter(|l| !l.is_release && !l.skip_analysis && !l.registry.is_empty())
        .count();
    if pending == 0 {
        return;
    }

    #[cfg(not(feature = "analysis"))]
    {
        log::warn!("Built without the `analysis` feature; sample offsets and volumes are not detected");
    }

    #[cfg(feature = "analysis")]
    for layer in layers.iter_mut() {
        if layer.is_release || layer.skip_analysis {
            continue;
        }

        let source = &layer.source;
        for sample in layer.registry.samples_mut() {
            match analyze_file(&source.join(&sample.filename)) {
                Ok(analysis) => {
                    sample.offset = analysis.offset;
                    sample.volume = analysis.volume;
                    sample.pan = analysis.pan;
                    log::info!("{}", sample);
                }
                Err(e) => log::warn!("Failed to analyze sample {}: {}", sample.filename, e),
            }
        }
    }
}
