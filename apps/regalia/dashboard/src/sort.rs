use std::cmp::Ordering;

use clap::ValueEnum;

use crate::cards::Card;

/// How cards are ordered on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortMode {
    /// Order in which keys first appeared.
    #[default]
    Arrival,
    /// Ascending by key.
    Key,
    /// Most recently updated first.
    Recency,
}

impl SortMode {
    pub fn compare(self, a: &Card, b: &Card) -> Ordering {
        match self {
            SortMode::Arrival => a.id.cmp(&b.id),
            SortMode::Key => a.key.cmp(&b.key),
            SortMode::Recency => b.updated_at.cmp(&a.updated_at),
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortMode::Arrival => SortMode::Key,
            SortMode::Key => SortMode::Recency,
            SortMode::Recency => SortMode::Arrival,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::Arrival => "arrival",
            SortMode::Key => "key",
            SortMode::Recency => "recency",
        }
    }
}

/// When re-sorting happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortPolicy {
    pub mode: SortMode,
    /// Re-sort after every frame instead of only on request.
    pub auto: bool,
}
