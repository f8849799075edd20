use crate::catalog::{TrialPlanEntry, TrialStimuli};
use crate::error::TrialRuntimeError;
use freeview_core::{PlacedStimulus, PositionAssignment, TrialRecord, Viewport};
use freeview_render::LayoutResult;

/// A trial in progress. Becomes an immutable [`TrialRecord`] via
/// [`TrialDraft::finish`].
#[derive(Debug, Clone)]
pub struct TrialDraft {
    pub index: usize,
    pub entry: TrialPlanEntry,
    pub viewport: Viewport,
    pub start_ms: f64,
    pub stimuli: Vec<PlacedStimulus>,
    pub assignment: Option<PositionAssignment>,
    pub fallback_layout: bool,
    pub runtime_error: Option<String>,
}

impl TrialDraft {
    pub fn new(index: usize, entry: TrialPlanEntry, viewport: Viewport, start_ms: f64) -> Self {
        Self {
            index,
            entry,
            viewport,
            start_ms,
            stimuli: Vec::new(),
            assignment: None,
            fallback_layout: false,
            runtime_error: None,
        }
    }

    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn start_tag(&self) -> String {
        format!("trial_start_T{}_{}", self.number(), self.entry.kind)
    }

    pub fn end_tag(&self) -> String {
        format!("trial_end_T{}", self.number())
    }

    pub fn interrupt_tag(&self) -> String {
        format!("trial_interrupted_T{}", self.number())
    }

    pub fn place(&mut self, stimuli: &TrialStimuli, layout: &LayoutResult) {
        self.viewport = layout.viewport;
        self.stimuli = stimuli.placed(layout);
        self.assignment = Some(stimuli.assignment.clone());
        self.fallback_layout = layout.is_fallback();
    }

    pub fn fail(&mut self, error: &TrialRuntimeError) {
        self.runtime_error = Some(match self.runtime_error.take() {
            Some(earlier) => format!("{earlier}; {error}"),
            None => error.to_string(),
        });
    }

    pub fn finish(self, end_ms: f64, pointer_sample_count: usize, interrupted: bool) -> TrialRecord {
        TrialRecord {
            trial_index: self.index,
            kind: self.entry.kind,
            source_index: self.entry.source_index,
            stimuli: self.stimuli,
            assignment: self.assignment,
            viewport: self.viewport,
            fallback_layout: self.fallback_layout,
            start_ms: self.start_ms,
            end_ms,
            pointer_sample_count,
            interrupted,
            runtime_error: self.runtime_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freeview_core::TrialKind;

    #[test]
    fn tags_use_one_based_numbers() {
        let draft = TrialDraft::new(
            2,
            TrialPlanEntry {
                kind: TrialKind::Filler,
                source_index: 0,
            },
            Viewport::new(800, 600),
            0.0,
        );
        assert_eq!(draft.start_tag(), "trial_start_T3_filler");
        assert_eq!(draft.end_tag(), "trial_end_T3");
    }

    #[test]
    fn errors_accumulate() {
        let mut draft = TrialDraft::new(
            0,
            TrialPlanEntry {
                kind: TrialKind::Image,
                source_index: 9,
            },
            Viewport::new(800, 600),
            5.0,
        );
        draft.fail(&TrialRuntimeError::Display("surface lost".into()));
        draft.fail(&TrialRuntimeError::Display("again".into()));
        let record = draft.finish(10.0, 0, false);
        assert_eq!(
            record.runtime_error.as_deref(),
            Some("display failed: surface lost; display failed: again")
        );
        assert_eq!(record.duration_ms(), 5.0);
    }
}
