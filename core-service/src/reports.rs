//! Operator-facing text for relayed run events.

use core_runtime::events::{CoreEvent, RestoreEvent, UploadEvent};

/// Text sent to the admin chat for `event`, if it is one we report.
pub fn render(event: &CoreEvent) -> Option<String> {
    match event {
        CoreEvent::Upload(UploadEvent::Progress {
            uploaded_files,
            skipped_files,
            total_files,
            percent,
            elapsed_secs,
            rate_per_minute,
            eta_secs,
            ..
        }) => {
            let eta = match eta_secs {
                Some(secs) => format!("{:.1} minutes", minutes(*secs)),
                None => "unknown".to_string(),
            };
            Some(
                [
                    "Upload Progress Report:".to_string(),
                    // files indexed by an earlier run count as done
                    format!(
                        "✅ Uploaded: {} of {} ({}%)",
                        uploaded_files + skipped_files,
                        total_files,
                        percent
                    ),
                    format!("⏱️ Elapsed: {:.1} minutes", minutes(*elapsed_secs)),
                    format!("📈 Rate: {:.1} files/minute", rate_per_minute),
                    format!("⏳ Estimated time remaining: {}", eta),
                ]
                .join("\n"),
            )
        }
        CoreEvent::Upload(UploadEvent::Completed {
            uploaded_files,
            skipped_files,
            failed_files,
            duration_secs,
            average_rate_per_minute,
            interrupted,
            ..
        }) => {
            let headline = if *interrupted {
                "⏹️ Upload Interrupted!"
            } else {
                "🏁 Upload Complete!"
            };
            Some(
                [
                    headline.to_string(),
                    format!("✅ Total Uploaded: {} files", uploaded_files),
                    format!("⏭️ Skipped: {} files", skipped_files),
                    format!("❌ Failed: {} files", failed_files),
                    format!("⏱️ Total Time: {:.1} minutes", minutes(*duration_secs)),
                    format!("📈 Average Rate: {:.1} files/minute", average_rate_per_minute),
                ]
                .join("\n"),
            )
        }
        CoreEvent::Upload(UploadEvent::Failed { message }) => {
            Some(format!("❌ Upload could not start: {}", message))
        }
        CoreEvent::Restore(RestoreEvent::Completed {
            restored,
            failed,
            duration_secs,
        }) => Some(
            [
                "📥 Restore Finished!".to_string(),
                format!("✅ Restored: {} files", restored),
                format!("❌ Failed: {} files", failed),
                format!("⏱️ Total Time: {:.1} minutes", minutes(*duration_secs)),
            ]
            .join("\n"),
        ),
        _ => None,
    }
}

fn minutes(secs: u64) -> f64 {
    secs as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::events::ChannelEvent;

    #[test]
    fn test_progress_report() {
        let event = CoreEvent::Upload(UploadEvent::Progress {
            run_id: "run".into(),
            uploaded_files: 30,
            skipped_files: 0,
            failed_files: 0,
            total_files: 120,
            percent: 25,
            elapsed_secs: 600,
            rate_per_minute: 3.0,
            eta_secs: Some(1800),
        });

        let text = render(&event).unwrap();
        assert_eq!(
            text,
            "Upload Progress Report:\n\
             ✅ Uploaded: 30 of 120 (25%)\n\
             ⏱️ Elapsed: 10.0 minutes\n\
             📈 Rate: 3.0 files/minute\n\
             ⏳ Estimated time remaining: 30.0 minutes"
        );
    }

    #[test]
    fn test_progress_counts_skipped_files() {
        let event = CoreEvent::Upload(UploadEvent::Progress {
            run_id: "run".into(),
            uploaded_files: 1,
            skipped_files: 9,
            failed_files: 0,
            total_files: 10,
            percent: 100,
            elapsed_secs: 60,
            rate_per_minute: 1.0,
            eta_secs: Some(0),
        });

        assert!(render(&event)
            .unwrap()
            .contains("✅ Uploaded: 10 of 10 (100%)"));
    }

    #[test]
    fn test_progress_without_rate() {
        let event = CoreEvent::Upload(UploadEvent::Progress {
            run_id: "run".into(),
            uploaded_files: 0,
            skipped_files: 0,
            failed_files: 0,
            total_files: 5,
            percent: 0,
            elapsed_secs: 600,
            rate_per_minute: 0.0,
            eta_secs: None,
        });

        assert!(render(&event)
            .unwrap()
            .ends_with("Estimated time remaining: unknown"));
    }

    #[test]
    fn test_final_report() {
        let event = CoreEvent::Upload(UploadEvent::Completed {
            run_id: "run".into(),
            uploaded_files: 8,
            skipped_files: 1,
            failed_files: 1,
            total_files: 10,
            duration_secs: 120,
            average_rate_per_minute: 4.0,
            interrupted: false,
        });

        let text = render(&event).unwrap();
        assert!(text.starts_with("🏁 Upload Complete!"));
        assert!(text.contains("✅ Total Uploaded: 8 files"));
        assert!(text.contains("⏱️ Total Time: 2.0 minutes"));
        assert!(text.contains("📈 Average Rate: 4.0 files/minute"));
    }

    #[test]
    fn test_interrupted_headline() {
        let event = CoreEvent::Upload(UploadEvent::Completed {
            run_id: "run".into(),
            uploaded_files: 1,
            skipped_files: 0,
            failed_files: 0,
            total_files: 10,
            duration_secs: 5,
            average_rate_per_minute: 12.0,
            interrupted: true,
        });

        assert!(render(&event).unwrap().starts_with("⏹️ Upload Interrupted!"));
    }

    #[test]
    fn test_unreported_events() {
        let event = CoreEvent::Channel(ChannelEvent::Registered {
            channel_id: "-100".into(),
            newly_added: true,
        });
        assert!(render(&event).is_none());

        let event = CoreEvent::Upload(UploadEvent::Started {
            run_id: "run".into(),
            total_files: 1,
            channels: 1,
            concurrency: 1,
        });
        assert!(render(&event).is_none());
    }
}
