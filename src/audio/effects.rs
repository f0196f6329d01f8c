//! Time-domain effects applied after (or instead of) band filtering.

/// Added to the peak before dividing so silence normalizes to silence.
pub const NORMALIZE_EPSILON: f64 = 1e-12;

/// Gap between the direct sound and its single echo, in seconds
pub const ECHO_DELAY_SECONDS: f64 = 0.3;

/// Echo gain per unit of intensity (`decay = intensity * 0.6`)
pub const ECHO_DECAY_FACTOR: f64 = 0.6;

/// Largest absolute sample value.
pub fn peak(samples: &[f64]) -> f64 {
    samples.iter().fold(0.0, |acc: f64, s| acc.max(s.abs()))
}

/// Peak-normalize: `x / (max|x| + 1e-12)`.
pub fn normalize(samples: &[f64]) -> Vec<f64> {
    let denominator = peak(samples) + NORMALIZE_EPSILON;
    samples.iter().map(|s| s / denominator).collect()
}

/// Sample-wise `(1 - intensity) * original + intensity * processed`.
///
/// Both slices are expected to have the same length; extra samples in the longer one
/// are dropped.
pub fn blend(original: &[f64], processed: &[f64], intensity: f64) -> Vec<f64> {
    original
        .iter()
        .zip(processed)
        .map(|(dry, wet)| (1.0 - intensity) * dry + intensity * wet)
        .collect()
}

/// Echo kernel of length `2 * delay_samples`: a unit tap at 0 and `decay` at `delay_samples`.
pub fn echo_impulse_response(delay_samples: usize, decay: f64) -> Vec<f64> {
    let mut response = vec![0.0; (2 * delay_samples).max(1)];
    response[0] = 1.0;
    if delay_samples > 0 {
        response[delay_samples] += decay;
    } else {
        response[0] += decay;
    }
    response
}

/// Convolve with `response`, keeping the output window aligned with the input
/// (`y[i] = sum_k response[k] * x[i - k]` for `i in 0..len`).
///
/// Zero taps are skipped, so sparse kernels like the echo response cost one pass per tap.
pub fn convolve_aligned(samples: &[f64], response: &[f64]) -> Vec<f64> {
    let mut output = vec![0.0; samples.len()];
    for (lag, &tap) in response.iter().enumerate() {
        if tap == 0.0 || lag >= samples.len() {
            continue;
        }
        for (out, &x) in output[lag..].iter_mut().zip(samples) {
            *out += tap * x;
        }
    }
    output
}

/// Add a single delayed, attenuated copy of the signal.
///
/// Returns the un-normalized mix; callers normalize before storing.
pub fn echo(samples: &[f64], sample_rate: u32, delay_seconds: f64, decay: f64) -> Vec<f64> {
    let delay_samples = (delay_seconds * sample_rate as f64).round().max(0.0) as usize;
    convolve_aligned(samples, &echo_impulse_response(delay_samples, decay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 0.4 * (2.0 * PI * 3.0 * i as f64 / len as f64).sin())
            .collect()
    }

    #[test]
    fn test_normalize_peak_is_one() {
        let normalized = normalize(&tone(1000));
        assert!((peak(&normalized) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(&tone(1000));
        let twice = normalize(&once);
        for (a, b) in once.iter().zip(&twice) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_normalize_silence() {
        let normalized = normalize(&[0.0; 16]);
        assert!(normalized.iter().all(|s| *s == 0.0));
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_blend_boundaries() {
        let dry = vec![1.0, -1.0, 0.5];
        let wet = vec![0.0, 0.25, -0.5];
        assert_eq!(blend(&dry, &wet, 0.0), dry);
        assert_eq!(blend(&dry, &wet, 1.0), wet);
        assert_eq!(blend(&dry, &wet, 0.5), vec![0.5, -0.375, 0.0]);
    }

    #[test]
    fn test_impulse_response_shape() {
        let response = echo_impulse_response(4, 0.3);
        assert_eq!(response, vec![1.0, 0.0, 0.0, 0.0, 0.3, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_echo_of_impulse() {
        let sample_rate = 22050;
        let mut impulse = vec![0.0; sample_rate as usize];
        impulse[0] = 1.0;

        let decay = 0.5 * 0.6;
        let output = normalize(&echo(&impulse, sample_rate, 0.3, decay));
        let delay = 6615;

        let nonzero: Vec<usize> = output
            .iter()
            .enumerate()
            .filter(|(_, s)| s.abs() > 1e-9)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(nonzero, vec![0, delay]);
        assert!((output[0] - 1.0).abs() < 1e-9);
        assert!((output[delay] / output[0] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_echo_shorter_than_delay_is_dry() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(echo(&input, 22050, 0.3, 0.6), input);
    }
}
