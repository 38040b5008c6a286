use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

const RUN_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Identifies one import/export run.
///
/// The `label` is the human-readable local time used in backup folder names and
/// export file names; the `nonce` keeps temporary directories unique when two
/// runs start within the same second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStamp {
    pub label: String,
    pub nonce: String,
}

impl RunStamp {
    pub fn now() -> Self {
        Self::at(Local::now())
    }

    pub fn at(time: DateTime<Local>) -> Self {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        Self {
            label: format_run_timestamp(time),
            nonce: nonce[..8].to_string(),
        }
    }

    /// Directory name for scratch space: `<label>_<nonce>`.
    pub fn scratch_name(&self) -> String {
        format!("{}_{}", self.label, self.nonce)
    }
}

/// Format a local time the way run folders are named (`2024-03-01_14-05-09`).
pub fn format_run_timestamp(time: DateTime<Local>) -> String {
    time.format(RUN_STAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_dashes_and_underscore() {
        let time = Local.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
        assert_eq!(format_run_timestamp(time), "2024-03-01_14-05-09");
    }

    #[test]
    fn scratch_names_differ_within_same_second() {
        let time = Local.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
        let a = RunStamp::at(time);
        let b = RunStamp::at(time);
        assert_eq!(a.label, b.label);
        assert_ne!(a.scratch_name(), b.scratch_name());
        assert!(a.scratch_name().starts_with("2024-03-01_14-05-09_"));
    }
}
