use approx::assert_relative_eq;
use scribe_core::segments::{
    clamp_to_duration, find_hard_spans, scrub, splice, HardSpanCriteria, Replacement, ScrubConfig,
    Segment,
};

/// Recognizer output as it arrives from the fast pass, JSON-encoded.
const FAST_PASS: &str = r#"[
    {"id": 0, "start": -0.05, "end": 2.0, "text": "Welcome back everyone.", "avg_logprob": -0.2, "speaker": "SPEAKER_00"},
    {"id": 1, "start": 2.0, "end": 4.5, "text": "The the the", "avg_logprob": -0.9, "compression_ratio": 2.4},
    {"id": 2, "start": 4.6, "end": 6.0, "text": "mumbled", "avg_logprob": -0.95},
    {"id": 3, "start": 6.0, "end": 6.1, "text": "uh"},
    {"id": 4, "start": 6.2, "end": 8.0, "text": "lalalalalalalalalala", "avg_logprob": -0.3},
    {"id": 5, "start": 8.0, "end": 12.0, "text": "Then the dragon landed.", "avg_logprob": -0.1},
    {"id": 6, "start": 20.5, "end": 23.0, "text": "Roll for initiative.", "avg_logprob": -0.4, "no_speech_prob": 0.5}
]"#;

#[test]
fn fast_pass_is_cleaned_rerun_and_clamped() {
    let raw: Vec<Segment> = serde_json::from_str(FAST_PASS).unwrap();
    let duration = 22.0;

    let cleaned = scrub(&raw, &ScrubConfig::default());
    let kept: Vec<usize> = cleaned.iter().map(|s| s.id).collect();
    // Too short (3) and a character loop (4) are gone.
    assert_eq!(kept, [0, 1, 2, 5, 6]);

    let criteria = HardSpanCriteria::new(-0.8, 2.2, 0.45);
    let spans = find_hard_spans(&cleaned, duration, &criteria);
    assert_eq!(spans.len(), 2);
    assert_relative_eq!(spans[0].start, 1.5);
    assert_relative_eq!(spans[0].end, 6.5);
    assert_relative_eq!(spans[1].start, 20.0);
    assert_relative_eq!(spans[1].end, 22.0);

    let replacements: Vec<Replacement> = spans
        .iter()
        .map(|span| Replacement {
            window_start: span.start,
            window_end: span.end,
            segments: vec![Segment::new(span.start + 0.6, span.end - 0.4, "precise")],
        })
        .collect();
    let spliced = splice(&cleaned, &replacements);
    let texts: Vec<&str> = spliced.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, ["precise", "Then the dragon landed.", "precise"]);
    assert_eq!(spliced.iter().map(|s| s.id).collect::<Vec<_>>(), [0, 1, 2]);

    let aligned = clamp_to_duration(&spliced, duration);
    assert_eq!(aligned.len(), 3);
    assert!(aligned
        .iter()
        .all(|s| s.start >= 0.0 && s.end <= duration - 1e-3 && s.end > s.start));
    assert_eq!(clamp_to_duration(&aligned, duration), aligned);
}

#[test]
fn opaque_fields_survive_the_pipeline() {
    let raw: Vec<Segment> = serde_json::from_str(FAST_PASS).unwrap();
    let aligned = clamp_to_duration(&scrub(&raw, &ScrubConfig::default()), 22.0);

    assert_relative_eq!(aligned[0].start, 0.0);
    let out = serde_json::to_value(&aligned[0]).unwrap();
    assert_eq!(out["speaker"], "SPEAKER_00");
    assert_eq!(out["text"], "Welcome back everyone.");
}
