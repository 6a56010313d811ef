//! Plan log - appends settled sessions to a JSONL file
//!
//! One line per session that reached `ready` or `error`. Write failures are logged and
//! never reach the session.

use crate::services::session::PlanningSession;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct PlanRecord<'a> {
    analysis_id: String,
    logged_at: DateTime<Utc>,
    session: &'a PlanningSession,
}

pub struct PlanLog {
    file_path: String,
}

impl PlanLog {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "plan_log_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Returns true if the line was written
    pub fn write_session(&self, session: &PlanningSession) -> bool {
        let record = PlanRecord {
            analysis_id: Uuid::now_v7().to_string(),
            logged_at: Utc::now(),
            session,
        };

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "plan_log_serialize_failed");
                return false;
            }
        };

        match self.append_line(&line) {
            Ok(()) => {
                debug!(
                    analysis_id = %record.analysis_id,
                    generation = %session.generation,
                    status = %session.status.as_str(),
                    "plan_logged"
                );
                true
            }
            Err(e) => {
                error!(file = %self.file_path, error = %e, "plan_log_write_failed");
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
