use std::{collections::HashMap, time::Instant};

use regalia_core::{format_scalar, DecodeError, FieldCatalog, FieldSpec, TelemetryObject, PLACEHOLDER};

use crate::sort::SortMode;

/// Stable identity of a card; survives every re-sort.
pub type CardId = u64;

/// One displayed telemetry key.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub key: String,
    pub field: FieldSpec,
    pub value: String,
    pub updated_at: Option<Instant>,
}

impl Card {
    fn new(id: CardId, key: &str, field: FieldSpec) -> Self {
        Self {
            id,
            key: key.to_string(),
            field,
            value: PLACEHOLDER.to_string(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    /// Keys seen for the first time, in payload order.
    pub created: Vec<String>,
    pub updated: usize,
}

/// Every key ever observed, mapped to its card.
///
/// Cards are created lazily and never removed. A key missing from a later
/// message keeps showing its last value.
#[derive(Debug)]
pub struct CardRegistry {
    catalog: FieldCatalog,
    cards: HashMap<String, Card>,
    /// Display order; starts as first-appearance order.
    order: Vec<String>,
    next_id: CardId,
}

impl CardRegistry {
    pub fn new(catalog: FieldCatalog) -> Self {
        Self {
            catalog,
            cards: HashMap::new(),
            order: Vec::new(),
            next_id: 0,
        }
    }

    /// Decodes `payload` and applies it. Nothing changes when it does not
    /// decode as an object.
    pub fn apply_payload(
        &mut self,
        payload: &str,
        now: Instant,
    ) -> Result<ApplySummary, DecodeError> {
        let object = TelemetryObject::decode(payload)?;
        Ok(self.apply_object(&object, now))
    }

    pub fn apply_object(&mut self, object: &TelemetryObject, now: Instant) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for (key, value) in object.iter() {
            if !self.cards.contains_key(key) {
                let card = Card::new(self.next_id, key, self.catalog.describe(key));
                self.next_id += 1;
                self.cards.insert(key.clone(), card);
                self.order.push(key.clone());
                summary.created.push(key.clone());
            }
            if let Some(card) = self.cards.get_mut(key) {
                card.value = format_scalar(value);
                card.updated_at = Some(now);
                summary.updated += 1;
            }
        }
        summary
    }

    pub fn get(&self, key: &str) -> Option<&Card> {
        self.cards.get(key)
    }

    /// Cards in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.order.iter().filter_map(|key| self.cards.get(key))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reorders the existing cards in place. Stable, so applying the same
    /// mode twice leaves the order unchanged.
    pub fn sort(&mut self, mode: SortMode) {
        let cards = &self.cards;
        self.order.sort_by(|a, b| match (cards.get(a), cards.get(b)) {
            (Some(a), Some(b)) => mode.compare(a, b),
            _ => std::cmp::Ordering::Equal,
        });
    }
}

impl Default for CardRegistry {
    fn default() -> Self {
        Self::new(FieldCatalog::builtin())
    }
}
