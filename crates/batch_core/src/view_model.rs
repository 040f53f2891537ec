use crate::{BatchEvent, ItemId, JobOutcome, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Waiting,
    Downloading,
    Finished,
    Error,
}

impl ItemStatus {
    pub fn label(self) -> &'static str {
        match self {
            ItemStatus::Waiting => "Waiting...",
            ItemStatus::Downloading => "Downloading...",
            ItemStatus::Finished => "Finished",
            ItemStatus::Error => "Error",
        }
    }
}

impl From<JobOutcome> for ItemStatus {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Finished => ItemStatus::Finished,
            JobOutcome::Error => ItemStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub id: ItemId,
    pub title: String,
    pub status: ItemStatus,
    pub percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewCounts {
    pub waiting: usize,
    pub downloading: usize,
    pub finished: usize,
    pub failed: usize,
}

/// Presentation state folded from `BatchEvent`s, keyed by `ItemId`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchView {
    rows: Vec<ItemRow>,
    overall_percent: u8,
    dirty: bool,
}

impl BatchView {
    pub fn new(items: &[WorkItem]) -> Self {
        let rows = items
            .iter()
            .map(|item| ItemRow {
                id: item.id(),
                title: item.title().to_owned(),
                status: ItemStatus::Waiting,
                percent: 0,
            })
            .collect();
        Self {
            rows,
            overall_percent: 0,
            dirty: true,
        }
    }

    /// Applies one event. Events for ids outside the batch are dropped.
    pub fn apply(&mut self, event: &BatchEvent) {
        match event {
            BatchEvent::ItemStarted { id, .. } => {
                if let Some(row) = self.rows.get_mut(*id) {
                    row.status = ItemStatus::Downloading;
                    self.dirty = true;
                }
            }
            BatchEvent::ItemProgress { id, percent, .. } => {
                if let Some(row) = self.rows.get_mut(*id) {
                    if *percent != row.percent {
                        row.percent = *percent;
                        self.dirty = true;
                    }
                }
            }
            BatchEvent::ItemFinished { id, outcome, .. } => {
                if let Some(row) = self.rows.get_mut(*id) {
                    row.status = ItemStatus::from(*outcome);
                    self.dirty = true;
                }
            }
            BatchEvent::BatchProgress { percent } => {
                self.overall_percent = *percent;
                self.dirty = true;
            }
        }
    }

    pub fn rows(&self) -> &[ItemRow] {
        &self.rows
    }

    pub fn row(&self, id: ItemId) -> Option<&ItemRow> {
        self.rows.get(id)
    }

    pub fn overall_percent(&self) -> u8 {
        self.overall_percent
    }

    pub fn counts(&self) -> ViewCounts {
        self.rows
            .iter()
            .fold(ViewCounts::default(), |mut counts, row| {
                match row.status {
                    ItemStatus::Waiting => counts.waiting += 1,
                    ItemStatus::Downloading => counts.downloading += 1,
                    ItemStatus::Finished => counts.finished += 1,
                    ItemStatus::Error => counts.failed += 1,
                }
                counts
            })
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
