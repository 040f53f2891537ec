//! Batch core: pure data model, output scraping and the run-state machine.
mod event;
mod item;
mod msg;
mod parser;
mod state;
mod update;
mod view_model;

pub use event::{batch_percent, BatchEvent, JobOutcome};
pub use item::{display_title, parse_identifiers, BatchRequest, ItemId, WorkItem, TITLE_MAX_CHARS};
pub use msg::Control;
pub use parser::{classify_line, LineClass, ProgressParser, DEFAULT_NOISE_MARKERS};
pub use state::{RunState, StopPolicy};
pub use update::{update, ControlError};
pub use view_model::{BatchView, ItemRow, ItemStatus, ViewCounts};
