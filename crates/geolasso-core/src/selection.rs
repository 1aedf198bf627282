//! The selection set and its replace / union / difference algebra.

use crate::feature::{Feature, FeatureKey};
use crate::input::{ModifierState, SelectionMode};
use crate::layer::LayerId;
use geo::Rect;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a mutation did to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Replaced,
    Added,
    Removed,
    Cleared,
}

/// Summary of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDelta {
    pub kind: ChangeKind,
    /// Entries that were not selected before.
    pub added: usize,
    /// Entries that are no longer selected.
    pub removed: usize,
    /// Selection size after the mutation.
    pub size: usize,
}

/// Currently selected features, unique by identity.
///
/// Entries are kept ordered by [`FeatureKey`], which makes iteration (and
/// therefore statistics and mask output) deterministic.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    features: BTreeMap<FeatureKey, Feature>,
    source_layer: Option<LayerId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, key: &FeatureKey) -> bool {
        self.features.contains_key(key)
    }

    pub fn get(&self, key: &FeatureKey) -> Option<&Feature> {
        self.features.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &FeatureKey> {
        self.features.keys()
    }

    /// Layer the selection was last replaced from.
    ///
    /// After the active layer changes this tag no longer describes the
    /// active layer; callers compare it with [`Self::is_from_layer`].
    pub fn source_layer(&self) -> Option<&str> {
        self.source_layer.as_deref()
    }

    pub fn is_from_layer(&self, layer: &str) -> bool {
        self.source_layer.as_deref() == Some(layer)
    }

    /// Union of the selected features' bounding boxes.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.iter().filter_map(Feature::bounds).reduce(|acc, b| {
            Rect::new(
                geo::coord! { x: acc.min().x.min(b.min().x), y: acc.min().y.min(b.min().y) },
                geo::coord! { x: acc.max().x.max(b.max().x), y: acc.max().y.max(b.max().y) },
            )
        })
    }

    /// Attribute keys present on at least one selected feature.
    pub fn fields(&self) -> BTreeSet<String> {
        self.iter().flat_map(|f| f.attributes().keys().cloned()).collect()
    }

    /// Attribute keys holding at least one numeric value in the selection.
    pub fn numeric_fields(&self) -> BTreeSet<String> {
        self.iter()
            .flat_map(|f| f.attributes().iter())
            .filter(|(_, value)| value.as_number().is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Merge a stroke's matches according to the frozen modifier snapshot.
    pub fn apply(&mut self, matched: Vec<Feature>, modifiers: ModifierState, active_layer: Option<&str>) -> SelectionDelta {
        match modifiers.mode() {
            SelectionMode::Difference => self.difference(&matched),
            SelectionMode::Union => self.union(matched, active_layer),
            SelectionMode::Replace => self.replace(matched, active_layer),
        }
    }

    /// Replace the whole selection and retag it with `layer`.
    pub fn replace(&mut self, matched: Vec<Feature>, layer: Option<&str>) -> SelectionDelta {
        let previous = std::mem::take(&mut self.features);
        for feature in matched {
            self.features.entry(feature.key().clone()).or_insert(feature);
        }
        self.source_layer = layer.map(str::to_string);

        let added = self.features.keys().filter(|k| !previous.contains_key(*k)).count();
        let removed = previous.keys().filter(|k| !self.features.contains_key(*k)).count();
        self.delta(ChangeKind::Replaced, added, removed)
    }

    /// Insert matches whose identity is not already selected.
    ///
    /// An untagged selection takes `layer` as its source.
    pub fn union(&mut self, matched: Vec<Feature>, layer: Option<&str>) -> SelectionDelta {
        let mut added = 0;
        for feature in matched {
            if !self.features.contains_key(feature.key()) {
                self.features.insert(feature.key().clone(), feature);
                added += 1;
            }
        }
        if self.source_layer.is_none() {
            self.source_layer = layer.map(str::to_string);
        }
        self.delta(ChangeKind::Added, added, 0)
    }

    /// Remove every entry sharing an identity with a match. Absent ones are ignored.
    pub fn difference(&mut self, matched: &[Feature]) -> SelectionDelta {
        let removed = matched
            .iter()
            .filter(|feature| self.features.remove(feature.key()).is_some())
            .count();
        self.delta(ChangeKind::Removed, 0, removed)
    }

    /// Drop every entry and the source tag.
    pub fn clear(&mut self) -> SelectionDelta {
        let removed = self.features.len();
        self.features.clear();
        self.source_layer = None;
        self.delta(ChangeKind::Cleared, 0, removed)
    }

    fn delta(&self, kind: ChangeKind, added: usize, removed: usize) -> SelectionDelta {
        SelectionDelta {
            kind,
            added,
            removed,
            size: self.features.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Attributes, attributes};
    use geo::point;

    fn f(id: u32) -> Feature {
        Feature::with_id(id, point!(x: id as f64, y: 0.0), attributes([("v", id as i64)]))
    }

    fn set_of(ids: &[u32]) -> SelectionSet {
        let mut set = SelectionSet::new();
        set.replace(ids.iter().map(|&i| f(i)).collect(), Some("layer"));
        set
    }

    fn ids(set: &SelectionSet) -> Vec<String> {
        set.keys().map(|k| k.to_string()).collect()
    }

    fn keys_of(ids: &[u32]) -> Vec<String> {
        let mut keys: Vec<String> = ids.iter().map(|&i| f(i).key().to_string()).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_replace_equals_matched() {
        let mut set = set_of(&[1, 2, 3]);
        let delta = set.replace(vec![f(3), f(4)], Some("roads"));
        assert_eq!(ids(&set), keys_of(&[3, 4]));
        assert_eq!(delta.kind, ChangeKind::Replaced);
        assert_eq!(delta.added, 1);
        assert_eq!(delta.removed, 2);
        assert!(set.is_from_layer("roads"));
    }

    #[test]
    fn test_replace_collapses_duplicates() {
        let mut set = SelectionSet::new();
        set.replace(vec![f(1), f(1), f(2)], None);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_union_superset_without_duplicates() {
        let mut set = set_of(&[1, 2]);
        let delta = set.union(vec![f(2), f(3)], Some("layer"));
        assert_eq!(ids(&set), keys_of(&[1, 2, 3]));
        assert_eq!(delta.added, 1);
        assert_eq!(delta.size, 3);
    }

    #[test]
    fn test_union_idempotent() {
        let mut once = set_of(&[1, 2]);
        once.union(vec![f(2), f(3)], None);
        let mut twice = once.clone();
        let delta = twice.union(vec![f(2), f(3)], None);
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(delta.added, 0);
    }

    #[test]
    fn test_difference_disjoint_subset() {
        let mut set = set_of(&[1, 2, 3]);
        let matched = vec![f(2), f(3), f(9)];
        let delta = set.difference(&matched);
        assert_eq!(ids(&set), keys_of(&[1]));
        assert_eq!(delta.removed, 2);
        for feature in &matched {
            assert!(!set.contains(feature.key()));
        }
    }

    #[test]
    fn test_apply_dispatch() {
        let mut set = set_of(&[1, 2]);
        set.apply(vec![f(2), f(3)], ModifierState::ADD, Some("layer"));
        assert_eq!(set.len(), 3);

        set.apply(vec![f(1)], ModifierState { add: true, remove: true }, Some("layer"));
        assert_eq!(ids(&set), keys_of(&[2, 3]));

        set.apply(vec![f(5)], ModifierState::REPLACE, Some("other"));
        assert_eq!(ids(&set), keys_of(&[5]));
        assert_eq!(set.source_layer(), Some("other"));
    }

    #[test]
    fn test_union_tags_untagged_selection() {
        let mut set = SelectionSet::new();
        set.union(vec![f(1)], Some("parcels"));
        assert!(set.is_from_layer("parcels"));
        set.union(vec![f(2)], Some("roads"));
        assert!(set.is_from_layer("parcels"));
    }

    #[test]
    fn test_clear() {
        let mut set = set_of(&[1, 2]);
        let delta = set.clear();
        assert!(set.is_empty());
        assert_eq!(delta.removed, 2);
        assert_eq!(set.source_layer(), None);
    }

    #[test]
    fn test_structural_identity_collapses() {
        let a = Feature::new(point!(x: 0.0, y: 0.0), attributes([("name", "same")]));
        let b = Feature::new(point!(x: 9.0, y: 9.0), attributes([("name", "same")]));
        let mut set = SelectionSet::new();
        set.replace(vec![a, b], None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_fields_and_bounds() {
        let mut set = SelectionSet::new();
        let mut attrs = Attributes::new();
        attrs.insert("label".into(), "x".into());
        set.replace(vec![f(1), f(4), Feature::with_id("t", point!(x: -2.0, y: 3.0), attrs)], None);

        assert!(set.fields().contains("label"));
        assert!(set.numeric_fields().contains("v"));
        assert!(!set.numeric_fields().contains("label"));

        let bounds = set.bounds().unwrap();
        assert_eq!(bounds.min().x, -2.0);
        assert_eq!(bounds.max().x, 4.0);
        assert_eq!(bounds.max().y, 3.0);
    }
}
