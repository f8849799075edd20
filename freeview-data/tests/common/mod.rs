#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use freeview_core::{
    Participant, PlacedStimulus, Point, PointerSample, Quadrant, SessionMetadata, Size,
    StimulusRole, TrialKind, TrialRecord, Viewport,
};
use freeview_data::DataAggregator;

pub fn started() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 2, 9, 0, 0).unwrap()
}

pub fn finished() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 2, 9, 4, 10).unwrap()
}

pub fn participant() -> Participant {
    Participant::new("17", "seventeen@example.org", "001").unwrap()
}

pub fn metadata(cancelled: bool) -> SessionMetadata {
    SessionMetadata {
        viewport: "320x240".into(),
        platform: "test".into(),
        experiment_duration_seconds: 250,
        cancelled,
    }
}

fn stimuli() -> Vec<PlacedStimulus> {
    StimulusRole::IMAGE
        .iter()
        .zip(Quadrant::ALL)
        .map(|(role, quadrant)| PlacedStimulus {
            role: *role,
            image: format!("{role}_01.jpg"),
            quadrant,
            origin: Point::new(
                if quadrant.is_left() { 20.0 } else { 180.0 },
                if quadrant.is_top() { 20.0 } else { 140.0 },
            ),
            size: Size::new(120, 80),
        })
        .collect()
}

pub fn trial(index: usize, samples: usize) -> (TrialRecord, Vec<PointerSample>) {
    let start = index as f64 * 10_500.0;
    let mut s = vec![PointerSample::tagged(start, 0.0, 0.0, format!("trial_start_T{}_image", index + 1))];
    s.extend((1..samples).map(|i| PointerSample::at(start + i as f64 * 16.0, 40.0 + i as f32, 60.0)));
    let record = TrialRecord {
        trial_index: index,
        kind: TrialKind::Image,
        source_index: index,
        stimuli: stimuli(),
        assignment: None,
        viewport: Viewport::new(320, 240),
        fallback_layout: true,
        start_ms: start,
        end_ms: start + 10_000.0,
        pointer_sample_count: s.iter().filter(|p| !p.is_event()).count(),
        interrupted: false,
        runtime_error: None,
    };
    (record, s)
}

/// Aggregator holding `recorded` trials out of `expected`
pub fn aggregator(recorded: usize, expected: usize) -> DataAggregator {
    let mut agg = DataAggregator::new(participant(), started(), expected);
    for i in 0..recorded {
        let (record, samples) = trial(i, 5);
        agg.record_trial(record, samples).unwrap();
    }
    agg
}
