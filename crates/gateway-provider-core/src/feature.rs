use std::collections::BTreeSet;

/// A capability a provider can advertise. `ModelPool::features_only`
/// filters pool entries by a requested feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Chat,
    Embedding,
    Streaming,
    Vision,
    ToolCalling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet(BTreeSet<Feature>);

impl FeatureSet {
    pub fn new(features: impl IntoIterator<Item = Feature>) -> Self {
        Self(features.into_iter().collect())
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    /// True iff every feature in `required` is present in `self`.
    pub fn is_superset_of(&self, required: &[Feature]) -> bool {
        required.iter().all(|f| self.0.contains(f))
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superset_check_requires_every_feature() {
        let set = FeatureSet::new([Feature::Chat, Feature::Streaming]);
        assert!(set.is_superset_of(&[Feature::Chat]));
        assert!(!set.is_superset_of(&[Feature::Chat, Feature::Vision]));
    }
}
