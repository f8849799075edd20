use crate::geometry::{Footprint, Point, Size, Viewport};
use crate::quadrant::{PositionAssignment, Quadrant};
use crate::stimulus::{StimulusRole, TrialKind};
use serde::{Deserialize, Serialize};

/// One pointer position, or a tagged milestone in the pointer stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub timestamp_ms: f64,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl PointerSample {
    pub fn at(timestamp_ms: f64, x: f32, y: f32) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            event: None,
        }
    }

    pub fn tagged(timestamp_ms: f64, x: f32, y: f32, event: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            event: Some(event.into()),
        }
    }

    pub fn is_event(&self) -> bool {
        self.event.is_some()
    }
}

/// A stimulus as it was shown: which image, where, and how large
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedStimulus {
    pub role: StimulusRole,
    pub image: String,
    pub quadrant: Quadrant,
    pub origin: Point,
    pub size: Size,
}

impl PlacedStimulus {
    pub fn footprint(&self) -> Footprint {
        Footprint::new(self.origin, self.size)
    }
}

/// Finalized trial. Built once by the sequencer and never modified after it
/// reaches the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_index: usize,
    pub kind: TrialKind,
    pub source_index: usize,
    pub stimuli: Vec<PlacedStimulus>,
    pub assignment: Option<PositionAssignment>,
    pub viewport: Viewport,
    pub fallback_layout: bool,
    pub start_ms: f64,
    pub end_ms: f64,
    /// Pointer positions captured, milestone marks excluded
    pub pointer_sample_count: usize,
    pub interrupted: bool,
    pub runtime_error: Option<String>,
}

impl TrialRecord {
    pub fn duration_ms(&self) -> f64 {
        (self.end_ms - self.start_ms).max(0.0)
    }

    /// 1-based trial number as shown to operators and in event tags
    pub fn trial_number(&self) -> usize {
        self.trial_index + 1
    }
}
