//! Local export, used when remote upload fails so captured data is never
//! discarded.

use crate::aggregator::DataAggregator;
use crate::artifacts::ArtifactSet;
use crate::error::ExportError;
use crate::upload::derive_in_background;
use async_trait::async_trait;
use freeview_core::{SessionId, SessionRecord};
use freeview_render::HeatmapRenderer;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

pub const RAW_EXPORT_NAME: &str = "raw_session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub location: String,
    pub files: Vec<String>,
}

#[async_trait]
pub trait LocalExporter: Send + Sync {
    async fn export(
        &self,
        session_id: &SessionId,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<ExportReport, ExportError>;
}

/// Writes files under `<root>/<session_id>/`, replacing earlier exports
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    root: PathBuf,
}

impl DirectoryExporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl LocalExporter for DirectoryExporter {
    async fn export(
        &self,
        session_id: &SessionId,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<ExportReport, ExportError> {
        let dir = self.root.join(export_dir_name(session_id)?);
        for (name, _) in &files {
            if !is_plain_file_name(name) {
                return Err(ExportError::InvalidPath(name.clone()));
            }
        }
        fs::create_dir_all(&dir).await?;
        let mut names = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            fs::write(dir.join(&name), bytes).await?;
            names.push(name);
        }
        Ok(ExportReport {
            location: dir.display().to_string(),
            files: names,
        })
    }
}

/// Session ids embed the participant id, so anything outside
/// `[A-Za-z0-9._-]` becomes `_` and the directory stays under the root
fn export_dir_name(session_id: &SessionId) -> Result<String, ExportError> {
    let name: String = session_id
        .as_str()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    if name.chars().all(|c| c == '.') {
        return Err(ExportError::InvalidPath(session_id.to_string()));
    }
    Ok(name)
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Keeps exports in memory
#[derive(Debug, Default)]
pub struct MemoryExporter {
    exports: Mutex<Vec<(SessionId, Vec<(String, Vec<u8>)>)>>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exports(&self) -> Vec<(SessionId, Vec<(String, Vec<u8>)>)> {
        self.exports.lock().clone()
    }
}

#[async_trait]
impl LocalExporter for MemoryExporter {
    async fn export(
        &self,
        session_id: &SessionId,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<ExportReport, ExportError> {
        let names = files.iter().map(|(n, _)| n.clone()).collect();
        self.exports.lock().push((session_id.clone(), files));
        Ok(ExportReport {
            location: format!("memory:{session_id}"),
            files: names,
        })
    }
}

#[derive(Serialize)]
struct RawSession<'a> {
    session: &'a SessionRecord,
    data: &'a DataAggregator,
}

/// Exports the given artifacts, deriving them first if needed. If
/// derivation fails the raw records and samples are exported as JSON.
pub async fn manual_export(
    exporter: &dyn LocalExporter,
    data: &DataAggregator,
    session: &SessionRecord,
    artifacts: Option<ArtifactSet>,
    renderer: &HeatmapRenderer,
) -> Result<ExportReport, ExportError> {
    let artifacts = match artifacts {
        Some(a) => Ok(a),
        None => derive_in_background(data, session, renderer, |_, _| {}).await,
    };

    let files = match artifacts {
        Ok(set) => set
            .iter()
            .map(|a| (a.name().to_string(), a.bytes.clone()))
            .collect(),
        Err(e) => {
            error!("artifact derivation failed, exporting raw data: {e}");
            let raw = serde_json::to_vec_pretty(&RawSession { session, data })?;
            vec![(RAW_EXPORT_NAME.to_string(), raw)]
        }
    };

    let report = exporter.export(&session.session_id, files).await?;
    info!(
        "exported {} files for {} to {}",
        report.files.len(),
        session.session_id,
        report.location
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use freeview_core::Participant;

    fn hostile_session() -> SessionId {
        let participant = Participant {
            participant_id: "../../../escaped".into(),
            email: "p@example.com".into(),
            session: "001".into(),
        };
        SessionId::compose(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), &participant)
    }

    #[tokio::test]
    async fn participant_id_cannot_leave_the_export_root() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("exports");
        let exporter = DirectoryExporter::new(&root);

        let report = exporter
            .export(&hostile_session(), vec![("summary.csv".into(), b"a,b".to_vec())])
            .await
            .unwrap();

        let written = Path::new(&report.location).join("summary.csv");
        let written = std::fs::canonicalize(written).unwrap();
        assert!(written.starts_with(std::fs::canonicalize(&root).unwrap()));
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 1);
        // only the export root was created next to it
        assert_eq!(std::fs::read_dir(outer.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn dot_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DirectoryExporter::new(dir.path());

        let err = exporter
            .export(&SessionId::from(".."), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidPath(_)));

        let err = exporter
            .export(
                &SessionId::from("EXP_1"),
                vec![("../summary.csv".into(), Vec::new())],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidPath(_)));
        assert!(!dir.path().join("EXP_1").exists());
    }
}
