use crate::app::{objects_dir, records_dir};
use crate::cli::SessionsCommand;
use anyhow::{Context, Result};
use freeview_core::SessionId;
use freeview_data::{CollisionPolicy, FsObjectStore, FsRecordStore, SessionAdmin, SessionFilter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn manage(data_dir: &Path, action: SessionsCommand) -> Result<()> {
    let admin = SessionAdmin::new(
        Arc::new(FsRecordStore::new(
            records_dir(data_dir),
            CollisionPolicy::Reject,
        )),
        Arc::new(FsObjectStore::new(objects_dir(data_dir))),
    );

    match action {
        SessionsCommand::List { search, status } => {
            let filter = SessionFilter {
                search,
                status: status.map(Into::into),
            };
            let sessions = admin.list(&filter).await?;
            if sessions.is_empty() {
                println!("No sessions found.");
            }
            for s in sessions {
                println!(
                    "{}  {:<9}  {:>3}/{:<3}  {}  {}",
                    s.session_id,
                    s.status.as_str(),
                    s.trials_completed,
                    s.trials_expected,
                    s.completed_at.format("%Y-%m-%d %H:%M"),
                    s.email
                );
            }
        }
        SessionsCommand::Summary => {
            let summary = admin.summary().await?;
            println!(
                "{} sessions: {} completed, {} partial",
                summary.total, summary.completed, summary.partial
            );
        }
        SessionsCommand::Delete { session_id } => {
            let removed = admin.delete(&SessionId::from(session_id.as_str())).await?;
            println!("Deleted {session_id} ({removed} files).");
        }
        SessionsCommand::Bundle { session_id, out } => {
            let bytes = admin.bundle(&SessionId::from(session_id.as_str())).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(format!("{session_id}_data.zip")));
            tokio::fs::write(&out, bytes)
                .await
                .with_context(|| format!("Failed to write bundle: {}", out.display()))?;
            println!("Wrote {}.", out.display());
        }
    }
    Ok(())
}
