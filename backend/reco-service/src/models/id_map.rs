use crate::error::ArtifactError;
use std::collections::HashMap;

/// Immutable external id ↔ dense internal index mapping.
///
/// Position in the source list is the internal index, so row `i` of every factor
/// matrix belongs to `external_ids[i]`.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    to_internal: HashMap<u64, usize>,
    to_external: Vec<u64>,
}

impl IdMap {
    pub fn from_external_ids(artifact: &str, external_ids: Vec<u64>) -> Result<Self, ArtifactError> {
        let mut to_internal = HashMap::with_capacity(external_ids.len());

        for (idx, &id) in external_ids.iter().enumerate() {
            if let Some(previous) = to_internal.insert(id, idx) {
                return Err(ArtifactError::invalid(
                    artifact,
                    format!("duplicate id {} at positions {} and {}", id, previous, idx),
                ));
            }
        }

        Ok(Self {
            to_internal,
            to_external: external_ids,
        })
    }

    pub fn internal(&self, external: u64) -> Option<usize> {
        self.to_internal.get(&external).copied()
    }

    pub fn external(&self, internal: usize) -> Option<u64> {
        self.to_external.get(internal).copied()
    }

    pub fn contains(&self, external: u64) -> bool {
        self.to_internal.contains_key(&external)
    }

    pub fn len(&self) -> usize {
        self.to_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_external.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bidirectional_lookup() {
        let map = IdMap::from_external_ids("users", vec![42, 7, 1000]).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.internal(7), Some(1));
        assert_eq!(map.external(2), Some(1000));
        assert_eq!(map.internal(8), None);
        assert_eq!(map.external(3), None);
        assert!(map.contains(42));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = IdMap::from_external_ids("items", vec![1, 2, 1]);
        assert!(matches!(result, Err(ArtifactError::Invalid { .. })));
    }

    #[test]
    fn test_zero_is_a_valid_index() {
        let map = IdMap::from_external_ids("items", vec![99]).unwrap();
        assert_eq!(map.internal(99), Some(0));
    }
}
