//! Storage for evaluated expression results.

use std::collections::BTreeMap;

use spotred_core::{Matrix, SpotId, SpotKind};

/// Read access to previously evaluated results.
pub trait ResultLookup: Sync {
    /// Row produced by a per-spot expression for one spot.
    fn per_spot(&self, expression: &str, spot: &SpotId) -> Option<&[f64]>;

    /// Matrix produced by a summary expression for one spot kind.
    fn summary(&self, expression: &str, kind: SpotKind) -> Option<&Matrix>;
}

/// Results of a reduction pass keyed by expression name.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResultStore {
    per_spot: BTreeMap<String, BTreeMap<SpotId, Vec<f64>>>,
    summaries: BTreeMap<String, BTreeMap<SpotKind, Matrix>>,
}

impl ResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the row of `expression` for `spot`.
    pub fn insert_spot(&mut self, expression: impl Into<String>, spot: SpotId, row: Vec<f64>) {
        self.per_spot
            .entry(expression.into())
            .or_default()
            .insert(spot, row);
    }

    /// Stores the summary matrix of `expression` for `kind`.
    pub fn insert_summary(&mut self, expression: impl Into<String>, kind: SpotKind, values: Matrix) {
        self.summaries
            .entry(expression.into())
            .or_default()
            .insert(kind, values);
    }

    /// Drops every stored row belonging to `spots` and every summary of `kind`.
    pub fn invalidate(&mut self, spots: &[SpotId], kind: SpotKind) {
        for rows in self.per_spot.values_mut() {
            for spot in spots {
                rows.remove(spot);
            }
        }
        for by_kind in self.summaries.values_mut() {
            by_kind.remove(&kind);
        }
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.per_spot.clear();
        self.summaries.clear();
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.per_spot.values().all(BTreeMap::is_empty)
            && self.summaries.values().all(BTreeMap::is_empty)
    }

    /// Per-spot rows of one expression in spot id order.
    pub fn spot_rows(&self, expression: &str) -> Option<&BTreeMap<SpotId, Vec<f64>>> {
        self.per_spot.get(expression)
    }

    /// Every per-spot result keyed by expression name.
    pub fn per_spot_results(&self) -> &BTreeMap<String, BTreeMap<SpotId, Vec<f64>>> {
        &self.per_spot
    }

    /// Every summary result keyed by expression name.
    pub fn summary_results(&self) -> &BTreeMap<String, BTreeMap<SpotKind, Matrix>> {
        &self.summaries
    }
}

impl ResultLookup for ResultStore {
    fn per_spot(&self, expression: &str, spot: &SpotId) -> Option<&[f64]> {
        self.per_spot
            .get(expression)
            .and_then(|rows| rows.get(spot))
            .map(Vec::as_slice)
    }

    fn summary(&self, expression: &str, kind: SpotKind) -> Option<&Matrix> {
        self.summaries
            .get(expression)
            .and_then(|by_kind| by_kind.get(&kind))
    }
}

/// Results of one spot evaluated within a stage, layered over a base store.
#[derive(Debug)]
pub struct SpotScratch<'a, L: ResultLookup + ?Sized> {
    base: &'a L,
    spot: SpotId,
    local: BTreeMap<String, Vec<f64>>,
}

impl<'a, L: ResultLookup + ?Sized> SpotScratch<'a, L> {
    /// Creates an empty overlay for `spot`.
    pub fn new(base: &'a L, spot: SpotId) -> Self {
        Self {
            base,
            spot,
            local: BTreeMap::new(),
        }
    }

    /// Records a freshly evaluated row.
    pub fn insert(&mut self, expression: impl Into<String>, row: Vec<f64>) {
        self.local.insert(expression.into(), row);
    }

    /// Consumes the overlay, returning the spot and its new rows.
    pub fn into_rows(self) -> (SpotId, BTreeMap<String, Vec<f64>>) {
        (self.spot, self.local)
    }
}

impl<L: ResultLookup + ?Sized> ResultLookup for SpotScratch<'_, L> {
    fn per_spot(&self, expression: &str, spot: &SpotId) -> Option<&[f64]> {
        if *spot == self.spot {
            if let Some(row) = self.local.get(expression) {
                return Some(row);
            }
        }
        self.base.per_spot(expression, spot)
    }

    fn summary(&self, expression: &str, kind: SpotKind) -> Option<&Matrix> {
        self.base.summary(expression, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_shadows_base_for_its_spot_only() {
        let mut store = ResultStore::new();
        store.insert_spot("A", SpotId::from("s1"), vec![1.0]);
        store.insert_spot("A", SpotId::from("s2"), vec![2.0]);
        let mut scratch = SpotScratch::new(&store, SpotId::from("s1"));
        scratch.insert("A", vec![10.0]);
        assert_eq!(scratch.per_spot("A", &SpotId::from("s1")), Some(&[10.0][..]));
        assert_eq!(scratch.per_spot("A", &SpotId::from("s2")), Some(&[2.0][..]));
    }

    #[test]
    fn invalidate_drops_rows_and_kind_summaries() {
        let mut store = ResultStore::new();
        store.insert_spot("A", SpotId::from("u1"), vec![1.0]);
        store.insert_spot("A", SpotId::from("r1"), vec![2.0]);
        store.insert_summary("W", SpotKind::Unknown, Matrix::scalar(3.0));
        store.insert_summary("W", SpotKind::ReferenceMaterial, Matrix::scalar(4.0));
        store.invalidate(&[SpotId::from("u1")], SpotKind::Unknown);
        assert!(store.per_spot("A", &SpotId::from("u1")).is_none());
        assert!(store.per_spot("A", &SpotId::from("r1")).is_some());
        assert!(store.summary("W", SpotKind::Unknown).is_none());
        assert!(!store.is_empty());
    }
}
