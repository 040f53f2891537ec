use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Finished,
    Error,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Finished => write!(f, "Finished"),
            JobOutcome::Error => write!(f, "Error"),
        }
    }
}

/// Notifications published by the run loop, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    ItemStarted {
        id: ItemId,
        title: String,
    },
    ItemProgress {
        id: ItemId,
        title: String,
        percent: u8,
    },
    ItemFinished {
        id: ItemId,
        title: String,
        outcome: JobOutcome,
    },
    BatchProgress {
        percent: u8,
    },
}

/// Share of `total` covered by `completed`, rounded down.
pub fn batch_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = completed.min(total) * 100 / total;
    percent as u8
}
