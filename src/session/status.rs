//! Session status snapshot reported to the host.

use serde::{Deserialize, Serialize};

use crate::types::ScanStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_active: bool,
    pub is_real_time_processing: bool,
    pub has_valid_measurements: bool,
    /// Recovery attempts currently outstanding, summed over categories.
    pub retry_count: u32,
    pub front_scan_completed: bool,
    pub side_scan_completed: bool,
    pub scan_status: ScanStatus,
}
