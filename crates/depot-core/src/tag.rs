//! The [`TagSet`] of output-accumulator tags.

use std::cmp::Ordering;
use std::iter::Copied;
use std::slice;

use smallvec::SmallVec;

use crate::id::TagId;

/// A set of tag IDs, stored sorted and deduplicated.
///
/// Used by units to declare which accumulators they contribute to, and
/// as the cache key for tag-filtered sub-registries. The storage is
/// normalized on every insert, so `{2, 0}` and `{0, 2, 2}` are the same
/// key, and memory depends on how many tags are held, never on how
/// large their ids are.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TagSet {
    tags: SmallVec<[TagId; 4]>,
}

impl TagSet {
    /// Create an empty tag set.
    pub fn empty() -> Self {
        Self {
            tags: SmallVec::new(),
        }
    }

    /// A set holding exactly one tag.
    pub fn single(tag: TagId) -> Self {
        let mut set = Self::empty();
        set.insert(tag);
        set
    }

    /// Add a tag. Returns `false` if it was already present.
    pub fn insert(&mut self, tag: TagId) -> bool {
        match self.tags.binary_search(&tag) {
            Ok(_) => false,
            Err(at) => {
                self.tags.insert(at, tag);
                true
            }
        }
    }

    /// Whether the set holds `tag`.
    pub fn contains(&self, tag: TagId) -> bool {
        self.tags.binary_search(&tag).is_ok()
    }

    /// Tags in either set.
    pub fn union(&self, other: &Self) -> Self {
        let mut tags: SmallVec<[TagId; 4]> =
            SmallVec::with_capacity(self.tags.len() + other.tags.len());
        let (mut a, mut b) = (self.iter().peekable(), other.iter().peekable());
        loop {
            let next = match (a.peek().copied(), b.peek().copied()) {
                (Some(x), Some(y)) => match x.cmp(&y) {
                    Ordering::Less => a.next(),
                    Ordering::Greater => b.next(),
                    Ordering::Equal => {
                        b.next();
                        a.next()
                    }
                },
                (Some(_), None) => a.next(),
                (None, Some(_)) => b.next(),
                (None, None) => break,
            };
            tags.extend(next);
        }
        Self { tags }
    }

    /// Tags in both sets.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            tags: self.iter().filter(|&t| other.contains(t)).collect(),
        }
    }

    /// Whether the two sets share at least one tag.
    pub fn intersects(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().any(|t| large.contains(t))
    }

    /// Whether every tag of `self` is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|t| other.contains(t))
    }

    /// Whether the set holds no tag.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Number of tags in the set.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Iterate over the tag IDs in the set, in ascending order.
    pub fn iter(&self) -> TagSetIter<'_> {
        TagSetIter {
            inner: self.tags.iter().copied(),
        }
    }
}

impl FromIterator<TagId> for TagSet {
    fn from_iter<I: IntoIterator<Item = TagId>>(iter: I) -> Self {
        let mut tags: SmallVec<[TagId; 4]> = iter.into_iter().collect();
        tags.sort_unstable();
        tags.dedup();
        Self { tags }
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = TagId;
    type IntoIter = TagSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over tag IDs in a [`TagSet`], yielding IDs in ascending order.
pub struct TagSetIter<'a> {
    inner: Copied<slice::Iter<'a, TagId>>,
}

impl Iterator for TagSetIter<'_> {
    type Item = TagId;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
