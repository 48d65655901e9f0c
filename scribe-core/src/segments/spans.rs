//! Interval algorithms: hard-span detection, splicing, duration clamping.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::Segment;

/// Merged spans shorter than this (after padding) are not worth a rerun.
const MIN_SPAN_S: f64 = 0.2;
/// Clamped segments end strictly before the file duration, by this much.
const DURATION_EPSILON: f64 = 1e-3;
/// Minimum length of a clamped segment.
const MIN_CLAMPED_LEN_S: f64 = 1e-3;

/// A contiguous region whose recognizer output is suspect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardSpan {
    pub start: f64,
    pub end: f64,
}

/// Segments recognized again inside one window, replacing the originals there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    pub window_start: f64,
    pub window_end: f64,
    pub segments: Vec<Segment>,
}

/// When a segment counts as hard, and how hard spans are grown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardSpanCriteria {
    pub logprob_thr: f64,
    pub cr_thr: f64,
    pub nospeech_thr: f64,
    /// Seconds added on both sides of every merged span.
    pub pad: f64,
    /// Spans separated by at most this many seconds are merged.
    pub merge_gap: f64,
}

impl HardSpanCriteria {
    /// Criteria with the default 0.5 s padding and 3 s merge gap.
    pub fn new(logprob_thr: f64, cr_thr: f64, nospeech_thr: f64) -> Self {
        Self {
            logprob_thr,
            cr_thr,
            nospeech_thr,
            pad: 0.5,
            merge_gap: 3.0,
        }
    }

    pub fn with_padding(mut self, pad: f64, merge_gap: f64) -> Self {
        self.pad = pad;
        self.merge_gap = merge_gap;
        self
    }

    fn is_hard(&self, s: &Segment) -> bool {
        s.avg_logprob.is_some_and(|lp| lp < self.logprob_thr)
            || s.compression_ratio.is_some_and(|cr| cr > self.cr_thr)
            || s.no_speech_prob.is_some_and(|ns| ns > self.nospeech_thr)
    }
}

fn by_start_end(a: (f64, f64), b: (f64, f64)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
}

/// Find padded, merged regions of low-confidence output within `[0, dur]`.
///
/// Hard segments are sorted by start and merged in one sweep when the gap
/// to the running span is at most `merge_gap`; each merged span is then
/// padded, clamped to the file, and dropped if shorter than 0.2 s.
pub fn find_hard_spans(segments: &[Segment], dur: f64, criteria: &HardSpanCriteria) -> Vec<HardSpan> {
    let mut marks: Vec<(f64, f64)> = segments
        .iter()
        .filter(|s| criteria.is_hard(s))
        .map(|s| (s.start, s.end))
        .collect();
    if marks.is_empty() {
        return Vec::new();
    }
    marks.sort_by(|a, b| by_start_end(*a, *b));

    let mut merged = Vec::new();
    let (mut cs, mut ce) = marks[0];
    for &(s, e) in &marks[1..] {
        if s - ce <= criteria.merge_gap {
            ce = ce.max(e);
        } else {
            merged.push((cs, ce));
            (cs, ce) = (s, e);
        }
    }
    merged.push((cs, ce));

    merged
        .into_iter()
        .map(|(s, e)| HardSpan {
            start: (s - criteria.pad).max(0.0),
            end: (e + criteria.pad).min(dur),
        })
        .filter(|span| span.end - span.start >= MIN_SPAN_S)
        .collect()
}

fn overlaps(a0: f64, a1: f64, b0: f64, b1: f64) -> bool {
    a0 < b1 && b0 < a1
}

/// Replace every original segment overlapping a replacement window with the
/// window's segments, then sort by `(start, end)` and renumber `id` from 0.
///
/// Replacement segments are not filtered against each other; overlapping
/// windows are the caller's concern.
pub fn splice(original: &[Segment], replacements: &[Replacement]) -> Vec<Segment> {
    let mut out: Vec<Segment> = original
        .iter()
        .filter(|s| {
            !replacements
                .iter()
                .any(|r| overlaps(s.start, s.end, r.window_start, r.window_end))
        })
        .cloned()
        .collect();
    out.extend(replacements.iter().flat_map(|r| r.segments.iter().cloned()));
    out.sort_by(|a, b| by_start_end((a.start, a.end), (b.start, b.end)));
    for (i, s) in out.iter_mut().enumerate() {
        s.id = i;
    }
    out
}

/// Fit segments inside `[0, dur)`.
///
/// Segments starting at or after `dur - 1e-3`, or ending at or before zero,
/// are dropped; with `dur <= 1e-3` nothing survives. The rest have `start` clipped into `[0, dur - 1e-3]` and
/// `end` into `[start + 1e-3, dur - 1e-3]` (the lower bound wins), so every
/// kept segment has `end > start`. Other fields, `id` included, are kept.
pub fn clamp_to_duration(segments: &[Segment], dur: f64) -> Vec<Segment> {
    let limit = dur - DURATION_EPSILON;
    let mut fixed = Vec::with_capacity(segments.len());
    let mut adjusted = 0usize;
    let mut dropped = 0usize;

    for s in segments {
        let start = s.start.min(limit).max(0.0);
        // Checked after clipping so `dur <= 1e-3` drops everything.
        if start >= limit || s.end <= 0.0 {
            dropped += 1;
            continue;
        }
        let end = s.end.min(limit).max(start + MIN_CLAMPED_LEN_S);
        if (start - s.start).abs() > DURATION_EPSILON || (end - s.end).abs() > DURATION_EPSILON {
            adjusted += 1;
        }
        fixed.push(Segment {
            start,
            end,
            ..s.clone()
        });
    }

    info!(
        kept = fixed.len(),
        adjusted,
        dropped,
        dur,
        "align-prepare: kept={} adjusted={} dropped={} (dur={:.2}s)",
        fixed.len(),
        adjusted,
        dropped,
        dur
    );
    fixed
}
