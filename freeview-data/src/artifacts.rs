use crate::error::ArtifactError;
use freeview_core::{PointerSample, SessionRecord, TrialRecord};
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    TrialData,
    MouseData,
    ParticipantInfo,
    Heatmaps,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::TrialData,
        ArtifactKind::MouseData,
        ArtifactKind::ParticipantInfo,
        ArtifactKind::Heatmaps,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::TrialData => "trial_data.csv",
            ArtifactKind::MouseData => "mouse_data.csv",
            ArtifactKind::ParticipantInfo => "participant_info.csv",
            ArtifactKind::Heatmaps => "heatmaps.zip",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Heatmaps => "application/zip",
            _ => "text/csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn name(&self) -> &'static str {
        self.kind.file_name()
    }
}

/// The four files exported per session, always in [`ArtifactKind::ALL`] order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    artifacts: Vec<Artifact>,
}

impl ArtifactSet {
    pub fn new(trial: String, mouse: String, participant: String, heatmaps: Vec<u8>) -> Self {
        Self {
            artifacts: vec![
                Artifact {
                    kind: ArtifactKind::TrialData,
                    bytes: trial.into_bytes(),
                },
                Artifact {
                    kind: ArtifactKind::MouseData,
                    bytes: mouse.into_bytes(),
                },
                Artifact {
                    kind: ArtifactKind::ParticipantInfo,
                    bytes: participant.into_bytes(),
                },
                Artifact {
                    kind: ArtifactKind::Heatmaps,
                    bytes: heatmaps,
                },
            ],
        }
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

const STIMULUS_SLOTS: usize = 4;

pub fn trial_csv<'a>(records: impl IntoIterator<Item = &'a TrialRecord>) -> String {
    let mut out = String::from(
        "trial_number,trial_index,trial_type,source_index,start_ms,end_ms,duration_ms,\
         pointer_samples,viewport,layout,interrupted,runtime_error",
    );
    for slot in 1..=STIMULUS_SLOTS {
        let _ = write!(
            out,
            ",stim{slot}_role,stim{slot}_image,stim{slot}_quadrant,stim{slot}_x,stim{slot}_y,\
             stim{slot}_width,stim{slot}_height"
        );
    }
    out.push('\n');

    for r in records {
        let _ = write!(
            out,
            "{},{},{},{},{:.3},{:.3},{:.3},{},{},{},{},{}",
            r.trial_number(),
            r.trial_index,
            r.kind,
            r.source_index,
            r.start_ms,
            r.end_ms,
            r.duration_ms(),
            r.pointer_sample_count,
            r.viewport,
            if r.fallback_layout { "fallback" } else { "primary" },
            r.interrupted,
            field(r.runtime_error.as_deref().unwrap_or("")),
        );
        for slot in 0..STIMULUS_SLOTS {
            match r.stimuli.get(slot) {
                Some(s) => {
                    let _ = write!(
                        out,
                        ",{},{},{},{:.1},{:.1},{},{}",
                        s.role.as_str(),
                        field(&s.image),
                        s.quadrant.label(),
                        s.origin.x,
                        s.origin.y,
                        s.size.width,
                        s.size.height
                    );
                }
                None => out.push_str(",,,,,,,"),
            }
        }
        out.push('\n');
    }
    out
}

/// One row per pointer sample, trial milestones included as tagged rows
pub fn mouse_csv<'a>(
    trials: impl IntoIterator<Item = (&'a TrialRecord, &'a [PointerSample])>,
) -> String {
    let mut out = String::from("trial_number,trial_type,timestamp_ms,x,y,event\n");
    for (record, samples) in trials {
        for s in samples {
            let _ = writeln!(
                out,
                "{},{},{:.3},{:.1},{:.1},{}",
                record.trial_number(),
                record.kind,
                s.timestamp_ms,
                s.x,
                s.y,
                field(s.event.as_deref().unwrap_or(""))
            );
        }
    }
    out
}

pub fn participant_csv(session: &SessionRecord) -> String {
    let mut out = String::from(
        "session_id,participant_id,email,session_number,started_at,completed_at,\
         trials_completed,trials_expected,is_partial,status,viewport,platform,\
         experiment_duration_seconds,cancelled\n",
    );
    let _ = writeln!(
        out,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        field(session.session_id.as_str()),
        field(&session.participant_id),
        field(&session.email),
        field(&session.session_number),
        session.started_at.to_rfc3339(),
        session.completed_at.to_rfc3339(),
        session.trials_completed,
        session.trials_expected,
        session.is_partial,
        session.status.as_str(),
        session.metadata.viewport,
        field(&session.metadata.platform),
        session.metadata.experiment_duration_seconds,
        session.metadata.cancelled,
    );
    out
}

pub fn heatmap_entry_name(record: &TrialRecord) -> String {
    format!("heatmap_trial_{:02}_{}.png", record.trial_number(), record.kind)
}

/// Packs named files into a zip. Entry timestamps are fixed so identical
/// input always yields identical bytes.
pub fn zip_entries<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a [u8])>,
) -> Result<Vec<u8>, ArtifactError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for (name, bytes) in entries {
        writer.start_file(name, options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}
