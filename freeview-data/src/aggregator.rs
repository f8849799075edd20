use crate::artifacts::{self, ArtifactSet};
use crate::error::{AggregateError, ArtifactError};
use chrono::{DateTime, Utc};
use freeview_core::{Participant, PointerSample, SessionMetadata, SessionRecord, TrialRecord};
use freeview_render::HeatmapRenderer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Everything captured during one run. Records are append-only; once a
/// trial index is recorded it is never replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAggregator {
    participant: Participant,
    started_at: DateTime<Utc>,
    trials_expected: usize,
    records: Vec<TrialRecord>,
    samples: BTreeMap<usize, Vec<PointerSample>>,
}

impl DataAggregator {
    pub fn new(participant: Participant, started_at: DateTime<Utc>, trials_expected: usize) -> Self {
        Self {
            participant,
            started_at,
            trials_expected,
            records: Vec::new(),
            samples: BTreeMap::new(),
        }
    }

    pub fn record_trial(
        &mut self,
        record: TrialRecord,
        samples: Vec<PointerSample>,
    ) -> Result<(), AggregateError> {
        let index = record.trial_index;
        if self.samples.contains_key(&index) {
            return Err(AggregateError::DuplicateTrial(index));
        }
        let supplied = samples.iter().filter(|s| !s.is_event()).count();
        if record.pointer_sample_count != supplied {
            return Err(AggregateError::SampleCountMismatch {
                trial: index,
                recorded: record.pointer_sample_count,
                supplied,
            });
        }

        debug!(
            "recorded trial {} ({} samples, interrupted={})",
            record.trial_number(),
            samples.len(),
            record.interrupted
        );
        self.samples.insert(index, samples);
        self.records.push(record);
        Ok(())
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn trials_expected(&self) -> usize {
        self.trials_expected
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn samples_for(&self, trial_index: usize) -> &[PointerSample] {
        self.samples
            .get(&trial_index)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn total_samples(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn session_record(
        &self,
        completed_at: DateTime<Utc>,
        metadata: SessionMetadata,
    ) -> SessionRecord {
        SessionRecord::new(
            &self.participant,
            self.started_at,
            completed_at,
            self.records.len(),
            self.trials_expected,
            metadata,
        )
    }

    fn sorted_records(&self) -> Vec<&TrialRecord> {
        let mut records: Vec<_> = self.records.iter().collect();
        records.sort_by_key(|r| r.trial_index);
        records
    }

    /// Builds all four artifacts from the accumulated state. Pure with
    /// respect to the aggregator: calling it twice yields the same bytes.
    /// `progress` receives `(current, total)` after each heatmap.
    pub fn derive_artifacts(
        &self,
        session: &SessionRecord,
        renderer: &HeatmapRenderer,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<ArtifactSet, ArtifactError> {
        let records = self.sorted_records();
        let trial_csv = artifacts::trial_csv(records.iter().copied());
        let mouse_csv = artifacts::mouse_csv(
            records
                .iter()
                .map(|r| (*r, self.samples_for(r.trial_index))),
        );
        let participant_csv = artifacts::participant_csv(session);

        let total = records.len();
        let mut heatmaps = Vec::with_capacity(total);
        for (i, record) in records.iter().enumerate() {
            let footprints: Vec<_> = record.stimuli.iter().map(|s| s.footprint()).collect();
            let png = renderer
                .render_png(
                    record.viewport,
                    &footprints,
                    self.samples_for(record.trial_index),
                )
                .map_err(|source| ArtifactError::Heatmap {
                    trial: record.trial_index,
                    source,
                })?;
            heatmaps.push((artifacts::heatmap_entry_name(record), png));
            progress(i + 1, total);
        }
        let zip = artifacts::zip_entries(
            heatmaps
                .iter()
                .map(|(name, png)| (name.as_str(), png.as_slice())),
        )?;

        Ok(ArtifactSet::new(trial_csv, mouse_csv, participant_csv, zip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freeview_core::{TrialKind, Viewport};

    fn participant() -> Participant {
        Participant::new("42", "p@example.org", "2").unwrap()
    }

    fn record(index: usize, samples: usize) -> TrialRecord {
        TrialRecord {
            trial_index: index,
            kind: TrialKind::Image,
            source_index: index,
            stimuli: Vec::new(),
            assignment: None,
            viewport: Viewport::new(320, 240),
            fallback_layout: false,
            start_ms: 0.0,
            end_ms: 10_000.0,
            pointer_sample_count: samples,
            interrupted: false,
            runtime_error: None,
        }
    }

    #[test]
    fn duplicate_trial_is_rejected() {
        let mut agg = DataAggregator::new(participant(), Utc::now(), 3);
        agg.record_trial(record(0, 0), Vec::new()).unwrap();
        assert_eq!(
            agg.record_trial(record(0, 0), Vec::new()),
            Err(AggregateError::DuplicateTrial(0))
        );
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn sample_count_must_match() {
        let mut agg = DataAggregator::new(participant(), Utc::now(), 3);
        let err = agg
            .record_trial(record(0, 2), vec![PointerSample::at(0.0, 1.0, 1.0)])
            .unwrap_err();
        assert!(matches!(err, AggregateError::SampleCountMismatch { supplied: 1, .. }));
        assert!(agg.is_empty());
    }

    #[test]
    fn milestones_are_not_pointer_samples() {
        let mut agg = DataAggregator::new(participant(), Utc::now(), 1);
        let samples = vec![
            PointerSample::tagged(0.0, 0.0, 0.0, "trial_start_T1_image"),
            PointerSample::at(5.0, 1.0, 1.0),
            PointerSample::at(9.0, 2.0, 1.0),
            PointerSample::tagged(10.0, 2.0, 1.0, "trial_end_T1"),
        ];
        agg.record_trial(record(0, 2), samples).unwrap();
        assert_eq!(agg.samples_for(0).len(), 4);
        assert_eq!(agg.records()[0].pointer_sample_count, 2);
    }

    #[test]
    fn unknown_trial_has_no_samples() {
        let agg = DataAggregator::new(participant(), Utc::now(), 1);
        assert!(agg.samples_for(9).is_empty());
    }
}
