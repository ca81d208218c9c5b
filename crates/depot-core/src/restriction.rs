//! Geometric restriction of a unit to a set of domain ids.

use smallvec::SmallVec;

use crate::id::RestrictionId;

/// Where a unit is active: everywhere, or on an explicit list of domains.
///
/// The explicit list is kept sorted and deduplicated so membership is a
/// binary search and two sets naming the same ids compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RestrictionSet {
    /// Active on every domain.
    #[default]
    Universal,
    /// Active only on the listed domains.
    Only(SmallVec<[RestrictionId; 4]>),
}

impl RestrictionSet {
    /// Restrict to the given ids. Order and duplicates are normalized away.
    pub fn only<I: IntoIterator<Item = RestrictionId>>(ids: I) -> Self {
        let mut ids: SmallVec<[RestrictionId; 4]> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self::Only(ids)
    }

    /// Whether the unit is active on `id`.
    pub fn accepts(&self, id: RestrictionId) -> bool {
        match self {
            Self::Universal => true,
            Self::Only(ids) => ids.binary_search(&id).is_ok(),
        }
    }

    /// Whether this is the universal sentinel.
    pub fn is_universal(&self) -> bool {
        matches!(self, Self::Universal)
    }

    /// The explicit ids, or an empty slice for [`RestrictionSet::Universal`].
    pub fn ids(&self) -> &[RestrictionId] {
        match self {
            Self::Universal => &[],
            Self::Only(ids) => ids,
        }
    }
}

impl FromIterator<RestrictionId> for RestrictionSet {
    fn from_iter<I: IntoIterator<Item = RestrictionId>>(iter: I) -> Self {
        Self::only(iter)
    }
}
