//! Per-request candidate snapshots.
//!
//! # Design Decisions
//! - A candidate set is immutable once built; narrowing returns a new set
//! - Members are `Arc<Destination>`, so a concurrent topology update can
//!   remove a destination without invalidating sets already handed out

use std::sync::Arc;

use crate::model::destination::Destination;

/// An immutable, ordered snapshot of destinations eligible for one request.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    destinations: Arc<[Arc<Destination>]>,
}

impl CandidateSet {
    /// Build a set from a destination snapshot.
    pub fn new(destinations: Vec<Arc<Destination>>) -> Self {
        Self {
            destinations: destinations.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Destination>> {
        self.destinations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Destination>> {
        self.destinations.get(index)
    }

    /// Look up a member by destination id.
    pub fn find(&self, id: &str) -> Option<&Arc<Destination>> {
        self.destinations.iter().find(|d| d.id == id)
    }

    /// Narrow to exactly the named destination, if present.
    pub fn narrow_to(&self, id: &str) -> Option<CandidateSet> {
        self.find(id)
            .map(|d| CandidateSet::new(vec![d.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> CandidateSet {
        CandidateSet::new(
            ids.iter()
                .map(|id| {
                    Arc::new(Destination::new(
                        *id,
                        "http://127.0.0.1:3000".parse().unwrap(),
                        1,
                    ))
                })
                .collect(),
        )
    }

    #[test]
    fn narrowing_produces_a_new_singleton_set() {
        let full = set(&["a", "b", "c"]);
        let narrowed = full.narrow_to("b").unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed.get(0).unwrap().id, "b");
        // Original set untouched.
        assert_eq!(full.len(), 3);
    }

    #[test]
    fn narrowing_to_absent_member_fails() {
        let full = set(&["a", "b"]);
        assert!(full.narrow_to("z").is_none());
    }
}
