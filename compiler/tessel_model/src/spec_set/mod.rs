//! Dense sets of specialization ids.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::SpecId;

/// A bitset over [`SpecId`]s.
///
/// Nodes rarely declare more than 64 specializations, so one inline word
/// covers the common case.
#[derive(Clone, Default)]
pub struct SpecSet {
    words: SmallVec<[u64; 1]>,
}

impl SpecSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn split(id: SpecId) -> (usize, u64) {
        let i = id.index();
        (i / 64, 1u64 << (i % 64))
    }

    /// Insert; returns `true` if newly added.
    pub fn insert(&mut self, id: SpecId) -> bool {
        let (word, bit) = Self::split(id);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    pub fn remove(&mut self, id: SpecId) -> bool {
        let (word, bit) = Self::split(id);
        match self.words.get_mut(word) {
            Some(w) if *w & bit != 0 => {
                *w &= !bit;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: SpecId) -> bool {
        let (word, bit) = Self::split(id);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Add every member of `other`; returns `true` if anything changed.
    pub fn union_with(&mut self, other: &SpecSet) -> bool {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            let next = *w | o;
            changed |= next != *w;
            *w = next;
        }
        changed
    }

    pub fn is_subset(&self, other: &SpecSet) -> bool {
        self.words.iter().enumerate().all(|(i, w)| {
            let o = other.words.get(i).copied().unwrap_or(0);
            w & !o == 0
        })
    }

    /// Members in ascending id (declaration) order.
    pub fn iter(&self) -> impl Iterator<Item = SpecId> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros();
                rest &= rest - 1;
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "ids originate from u32 values"
                )]
                Some(SpecId::from_raw((i * 64) as u32 + bit))
            })
        })
    }

    /// A set holding exactly `id`.
    pub fn single(id: SpecId) -> Self {
        let (word, bit) = Self::split(id);
        let mut words = smallvec![0; word + 1];
        words[word] = bit;
        SpecSet { words }
    }
}

/// Words up to the last non-zero one.
fn trimmed(words: &[u64]) -> &[u64] {
    let end = words.iter().rposition(|w| *w != 0).map_or(0, |i| i + 1);
    &words[..end]
}

impl PartialEq for SpecSet {
    fn eq(&self, other: &Self) -> bool {
        trimmed(&self.words) == trimmed(&other.words)
    }
}

impl Eq for SpecSet {}

impl std::hash::Hash for SpecSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        trimmed(&self.words).hash(state);
    }
}

impl FromIterator<SpecId> for SpecSet {
    fn from_iter<I: IntoIterator<Item = SpecId>>(iter: I) -> Self {
        let mut set = SpecSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl fmt::Debug for SpecSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u32) -> SpecId {
        SpecId::from_raw(i)
    }

    #[test]
    fn insert_remove_contains() {
        let mut set = SpecSet::new();
        assert!(set.is_empty());
        assert!(set.insert(id(3)));
        assert!(!set.insert(id(3)));
        assert!(set.insert(id(70)));
        assert!(set.contains(id(3)));
        assert!(set.contains(id(70)));
        assert!(!set.contains(id(4)));
        assert_eq!(set.len(), 2);
        assert!(set.remove(id(3)));
        assert!(!set.remove(id(3)));
        assert!(!set.remove(id(500)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn iterates_in_order() {
        let set: SpecSet = [id(65), id(2), id(0), id(9)].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![id(0), id(2), id(9), id(65)]);
    }

    #[test]
    fn union_and_subset() {
        let mut a: SpecSet = [id(1), id(2)].into_iter().collect();
        let b: SpecSet = [id(2), id(100)].into_iter().collect();
        assert!(!b.is_subset(&a));
        assert!(a.union_with(&b));
        assert!(!a.union_with(&b));
        assert!(b.is_subset(&a));
        assert!(SpecSet::new().is_subset(&b));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn equality_ignores_trailing_words() {
        let mut a = SpecSet::single(id(1));
        a.insert(id(130));
        a.remove(id(130));
        assert_eq!(a, SpecSet::single(id(1)));
        assert_ne!(a, SpecSet::new());
    }
}
