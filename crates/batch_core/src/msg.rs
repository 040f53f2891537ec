#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Caller asked to begin the batch.
    Start,
    /// Caller asked to hold before the next item.
    Pause,
    /// Caller lifted a pause.
    Resume,
    /// Caller asked to start no further items.
    Stop,
    /// Run loop ran out of items.
    LoopEnded,
}
