use crate::error::NotificationError;
use crate::store::{Notifier, Subscriber};
use async_trait::async_trait;
use freeview_core::SessionRecord;
use futures::future::join_all;
use tracing::{info, warn};

pub fn completion_message(record: &SessionRecord) -> String {
    format!(
        "Experiment {status}\n\n\
         Participant: {participant}\n\
         Email: {email}\n\
         Session: {session}\n\
         Date: {date}\n\
         Time: {time}\n\
         Session ID: {id}\n\
         Status: {status}\n\
         Trials: {done}/{expected}",
        status = record.status.as_str(),
        participant = record.participant_id,
        email = record.email,
        session = record.session_number,
        date = record.completed_at.format("%Y-%m-%d"),
        time = record.completed_at.format("%H:%M:%S UTC"),
        id = record.session_id,
        done = record.trials_completed,
        expected = record.trials_expected,
    )
}

#[derive(Debug, Default)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: Vec<NotificationError>,
}

impl NotifyReport {
    pub fn total(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Sends the completion message to every subscriber and waits for all
/// deliveries to settle. Individual failures are collected, not raised.
pub async fn notify_all(
    notifier: &dyn Notifier,
    record: &SessionRecord,
) -> Result<NotifyReport, NotificationError> {
    let subscribers = notifier.list_subscribers().await?;
    if subscribers.is_empty() {
        info!("no notification subscribers");
        return Ok(NotifyReport::default());
    }

    let text = completion_message(record);
    let results = join_all(
        subscribers
            .iter()
            .map(|s| notifier.send(&s.address, &text)),
    )
    .await;

    let mut report = NotifyReport::default();
    for result in results {
        match result {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!("{e}");
                report.failed.push(e);
            }
        }
    }
    info!(
        "notifications: {} sent, {} failed",
        report.delivered,
        report.failed.len()
    );
    Ok(report)
}

/// Writes notifications to the log instead of a messaging service
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    subscribers: Vec<Subscriber>,
}

impl LogNotifier {
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self { subscribers }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, NotificationError> {
        Ok(self.subscribers.clone())
    }

    async fn send(&self, address: &str, text: &str) -> Result<(), NotificationError> {
        info!(target: "freeview::notify", "to {address}:\n{text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryNotifier;
    use chrono::{TimeZone, Utc};
    use freeview_core::{Participant, SessionMetadata};

    fn record(completed: usize) -> SessionRecord {
        let p = Participant::new("9", "nine@example.org", "003").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 14, 30, 5).unwrap();
        let meta = SessionMetadata {
            viewport: "1280x720".into(),
            platform: "linux".into(),
            experiment_duration_seconds: 90,
            cancelled: completed < 4,
        };
        SessionRecord::new(&p, at, at, completed, 4, meta)
    }

    fn subscriber(address: &str) -> Subscriber {
        Subscriber {
            address: address.into(),
            name: None,
        }
    }

    #[test]
    fn message_reports_actual_status() {
        let text = completion_message(&record(2));
        assert!(text.contains("Participant: 9"));
        assert!(text.contains("Session: 003"));
        assert!(text.contains("Date: 2025-06-01"));
        assert!(text.contains("Time: 14:30:05 UTC"));
        assert!(text.contains("Session ID: EXP_20250601_p9_s003"));
        assert!(text.contains("Status: partial"));
    }

    #[tokio::test]
    async fn one_failed_delivery_does_not_stop_the_rest() {
        let notifier = MemoryNotifier::new(vec![subscriber("a"), subscriber("b"), subscriber("c")])
            .failing_for("b");
        let report = notify_all(&notifier, &record(4)).await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.total(), 3);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn no_subscribers_is_fine() {
        let report = notify_all(&LogNotifier::default(), &record(4)).await.unwrap();
        assert_eq!(report.total(), 0);
    }
}
