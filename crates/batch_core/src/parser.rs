//! Best-effort scraping of the download tool's stdout.
//!
//! The tool's output format is not a contract, so classification is total:
//! every input maps to some `LineClass` and nothing here can fail.

/// Informational warnings the reference tool repeats for every track.
pub const DEFAULT_NOISE_MARKERS: &[&str] = &["AZLyrics"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Blank, known noise, or a `%` line whose number could not be read.
    Ignored,
    /// Percentage in `0..=100` found right before the first `%`.
    Percent(u8),
    /// Any other text. Callers treat it like `Ignored`.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressParser {
    noise_markers: Vec<String>,
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_MARKERS.iter().copied())
    }
}

impl ProgressParser {
    pub fn new<I, S>(noise_markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            noise_markers: noise_markers
                .into_iter()
                .map(Into::into)
                .filter(|marker: &String| !marker.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, line: &str) -> LineClass {
        classify_with(line, &self.noise_markers)
    }
}

/// Classifies a line using `DEFAULT_NOISE_MARKERS`.
pub fn classify_line(line: &str) -> LineClass {
    classify_with(line, DEFAULT_NOISE_MARKERS)
}

fn classify_with<S: AsRef<str>>(line: &str, noise_markers: &[S]) -> LineClass {
    let line = line.trim();
    if line.is_empty() {
        return LineClass::Ignored;
    }
    if noise_markers
        .iter()
        .any(|marker| line.contains(marker.as_ref()))
    {
        return LineClass::Ignored;
    }
    if !line.contains('%') {
        return LineClass::Unrecognized;
    }
    match extract_percent(line) {
        Some(value) => LineClass::Percent(value),
        None => LineClass::Ignored,
    }
}

fn extract_percent(line: &str) -> Option<u8> {
    let (before, _) = line.split_once('%')?;
    let token = before.split_whitespace().last()?;
    let value: u8 = token.parse().ok()?;
    (value <= 100).then_some(value)
}
