use std::path::{Path, PathBuf};

use url::Url;

/// Position of an item in its batch. Unique within a batch, unlike titles.
pub type ItemId = usize;

/// Display titles are cut to this many characters.
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    id: ItemId,
    identifier: String,
    title: String,
}

impl WorkItem {
    pub fn new(id: ItemId, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let title = display_title(&identifier);
        Self {
            id,
            identifier,
            title,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Ordered items plus the directory the external tool writes into.
///
/// Emptiness is not rejected here; the controller reports it when the batch
/// is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    items: Vec<WorkItem>,
    output_dir: PathBuf,
}

impl BatchRequest {
    pub fn new<I, S>(identifiers: I, output_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = identifiers
            .into_iter()
            .enumerate()
            .map(|(id, identifier)| WorkItem::new(id, identifier))
            .collect();
        Self {
            items,
            output_dir: output_dir.into(),
        }
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Short, human-facing label for an identifier.
///
/// Uses the last non-empty path segment (query and fragment dropped for
/// URLs), falling back to the identifier itself, cut to `TITLE_MAX_CHARS`.
pub fn display_title(identifier: &str) -> String {
    let identifier = identifier.trim();
    let segment = match Url::parse(identifier) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(ToOwned::to_owned),
        Err(_) => identifier
            .split('/')
            .filter(|s| !s.is_empty())
            .last()
            .map(ToOwned::to_owned),
    };
    let source = segment.unwrap_or_else(|| identifier.to_owned());
    source.chars().take(TITLE_MAX_CHARS).collect()
}

/// Splits a newline-delimited list into identifiers, skipping blank lines.
pub fn parse_identifiers(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
