//! Scalar statistics over samples and segment lists.

/// Root-mean-square of a sample slice, `0.0` when empty.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Amplitude to dB relative to full scale. Zero (or negative) maps to `-inf`.
pub fn dbfs(amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * amplitude.log10()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in `[0, 100]`. An empty list yields `0.0`.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Gaps between consecutive speech segments, including the leading gap from
/// zero and a trailing gap up to `duration`. No segments means no gaps.
pub fn gaps(segments: &[(f64, f64)], duration: f64) -> Vec<f64> {
    if segments.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(segments.len() + 1);
    let mut prev_end = 0.0;
    for &(start, end) in segments {
        if start > prev_end {
            out.push(start - prev_end);
        }
        prev_end = end;
    }
    if prev_end < duration {
        out.push(duration - prev_end);
    }
    out
}

/// Fraction of durations strictly below `limit_s`; `0.0` for an empty list.
pub fn micro_segment_ratio(durations: &[f64], limit_s: f64) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    let tiny = durations.iter().filter(|&&d| d < limit_s).count();
    tiny as f64 / durations.len() as f64
}

/// Fraction of samples whose magnitude is at or above `level`.
pub fn clipping_ratio(samples: &[f32], level: f32) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let clipped = samples.iter().filter(|s| s.abs() >= level).count();
    clipped as f64 / samples.len() as f64
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f64 {
    samples
        .iter()
        .fold(0.0f32, |acc, s| acc.max(s.abs()))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn percentile_interpolates_like_numpy() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&values, 50.0), 2.5);
        assert_relative_eq!(percentile(&values, 25.0), 1.75);
        assert_relative_eq!(percentile(&values, 95.0), 3.85, epsilon = 1e-12);
        assert_relative_eq!(percentile(&[7.0], 90.0), 7.0);
    }

    #[test]
    fn percentile_of_empty_is_zero() {
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn dbfs_of_zero_is_negative_infinity() {
        assert_eq!(dbfs(0.0), f64::NEG_INFINITY);
        assert_relative_eq!(dbfs(1.0), 0.0);
        assert_relative_eq!(dbfs(0.1), -20.0, epsilon = 1e-12);
    }

    #[test]
    fn gaps_include_leading_and_trailing_silence() {
        let segs = [(0.5, 1.0), (1.0, 2.0), (2.6, 3.0)];
        let g = gaps(&segs, 4.0);
        assert_eq!(g.len(), 3);
        assert_relative_eq!(g[0], 0.5);
        assert_relative_eq!(g[1], 0.6, epsilon = 1e-12);
        assert_relative_eq!(g[2], 1.0);
        assert!(gaps(&[], 4.0).is_empty());
    }

    #[test]
    fn micro_ratio_counts_short_segments() {
        assert_relative_eq!(micro_segment_ratio(&[0.5, 1.5, 1.19, 3.0], 1.2), 0.5);
        assert_eq!(micro_segment_ratio(&[], 1.2), 0.0);
    }

    #[test]
    fn clipping_counts_near_full_scale() {
        let samples = [0.999, -1.0, 0.5, 0.0];
        assert_relative_eq!(clipping_ratio(&samples, 0.999), 0.5);
        assert_relative_eq!(peak(&samples), 1.0);
    }
}
