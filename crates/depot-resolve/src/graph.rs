//! Dependency graph construction and depth-first topological sort.
//!
//! The graph is transient: it is built from a unit list, ordered, and
//! dropped. Nothing here runs inside the compute loop.

use std::error::Error;
use std::fmt;
use std::ops::Deref;

use depot_core::Unit;
use indexmap::IndexMap;
use smallvec::SmallVec;

// ── Errors ─────────────────────────────────────────────────────────

/// The declared dependencies contain a cycle, so no valid order exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CyclicDependencyError {
    /// Names of the units on the cycle, in traversal order. The last
    /// unit requires something the first one provides.
    pub cycle: Vec<String>,
}

impl CyclicDependencyError {
    /// Whether the named unit is part of the cycle.
    pub fn involves(&self, name: &str) -> bool {
        self.cycle.iter().any(|n| n == name)
    }
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cyclic dependency: ")?;
        for name in &self.cycle {
            write!(f, "'{name}' -> ")?;
        }
        match self.cycle.first() {
            Some(first) => write!(f, "'{first}'"),
            None => write!(f, "<empty>"),
        }
    }
}

impl Error for CyclicDependencyError {}

/// A requirement that no unit in the sorted list provides.
///
/// Not an error by itself: the provider may live in another registry
/// or outside the warehouse entirely. Callers decide whether it is fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedRequirement {
    /// The requiring unit.
    pub unit: String,
    /// The name nobody provides.
    pub requirement: String,
}

// ── Graph ──────────────────────────────────────────────────────────

/// Edges between units derived from requires/provides intersection.
///
/// For units `a` and `b`, `a` depends on `b` iff some name `a` requires
/// is provided by `b`. A unit never depends on itself.
#[derive(Debug)]
pub struct DependencyGraph {
    names: Vec<String>,
    /// `depends_on[a]`: indices `a` must run after, ascending, no duplicates.
    depends_on: Vec<SmallVec<[usize; 4]>>,
    unresolved: Vec<UnresolvedRequirement>,
}

impl DependencyGraph {
    /// Build the graph for `units`. Node `i` is `units[i]`.
    pub fn build<U, P>(units: &[P]) -> Self
    where
        U: Unit + ?Sized,
        P: Deref<Target = U>,
    {
        let mut providers: IndexMap<String, SmallVec<[usize; 2]>> = IndexMap::new();
        for (i, unit) in units.iter().enumerate() {
            for name in unit.provides() {
                let entry = providers.entry(name).or_default();
                if entry.last() != Some(&i) {
                    entry.push(i);
                }
            }
        }

        let mut names = Vec::with_capacity(units.len());
        let mut depends_on = Vec::with_capacity(units.len());
        let mut unresolved = Vec::new();

        for (a, unit) in units.iter().enumerate() {
            let mut deps: SmallVec<[usize; 4]> = SmallVec::new();
            for requirement in unit.requires() {
                match providers.get(&requirement) {
                    Some(bs) => deps.extend(bs.iter().copied().filter(|&b| b != a)),
                    None => unresolved.push(UnresolvedRequirement {
                        unit: unit.name().to_string(),
                        requirement,
                    }),
                }
            }
            deps.sort_unstable();
            deps.dedup();
            names.push(unit.name().to_string());
            depends_on.push(deps);
        }

        Self {
            names,
            depends_on,
            unresolved,
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.depends_on.iter().map(|d| d.len()).sum()
    }

    /// Indices node `i` must run after, ascending.
    pub fn dependencies_of(&self, i: usize) -> &[usize] {
        self.depends_on.get(i).map_or(&[], |d| d.as_slice())
    }

    /// Requirements with no provider among the nodes.
    pub fn unresolved(&self) -> &[UnresolvedRequirement] {
        &self.unresolved
    }

    /// Depth-first topological order.
    ///
    /// Roots are visited in index order and each node's dependencies in
    /// ascending index order, so unrelated units keep their relative
    /// input order and identical inputs always give identical output.
    pub fn topological_order(&self) -> Result<Vec<usize>, CyclicDependencyError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let n = self.len();
        let mut marks = vec![Mark::Unvisited; n];
        let mut order = Vec::with_capacity(n);
        // (node, index of the next dependency to visit)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                match self.depends_on[node].get(top.1).copied() {
                    Some(dep) => {
                        top.1 += 1;
                        match marks[dep] {
                            Mark::Unvisited => {
                                marks[dep] = Mark::InProgress;
                                stack.push((dep, 0));
                            }
                            Mark::InProgress => return Err(self.cycle_from(&stack, dep)),
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[node] = Mark::Done;
                        order.push(node);
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }

    /// The portion of the DFS stack that starts at `revisited`.
    fn cycle_from(&self, stack: &[(usize, usize)], revisited: usize) -> CyclicDependencyError {
        let start = stack
            .iter()
            .position(|&(node, _)| node == revisited)
            .unwrap_or(0);
        CyclicDependencyError {
            cycle: stack[start..]
                .iter()
                .map(|&(node, _)| self.names[node].clone())
                .collect(),
        }
    }
}

// ── Sorting ────────────────────────────────────────────────────────

/// Outcome of a successful [`sort_by_dependencies`].
#[derive(Debug, Default)]
pub struct ResolvedOrder {
    /// Number of dependency edges honoured by the order.
    pub edge_count: usize,
    /// Requirements nobody in the list provides.
    pub unresolved: Vec<UnresolvedRequirement>,
}

/// Permute `items` in place into dependency order.
///
/// On error `items` is left untouched; the caller must not run an
/// unsorted list.
pub fn sort_by_dependencies<U, P>(
    items: &mut Vec<P>,
) -> Result<ResolvedOrder, CyclicDependencyError>
where
    U: Unit + ?Sized,
    P: Deref<Target = U>,
{
    if items.is_empty() {
        return Ok(ResolvedOrder::default());
    }

    let graph = DependencyGraph::build(items.as_slice());
    let order = graph.topological_order()?;

    let mut slots: Vec<Option<P>> = items.drain(..).map(Some).collect();
    items.extend(order.iter().filter_map(|&i| slots[i].take()));

    Ok(ResolvedOrder {
        edge_count: graph.edge_count(),
        unresolved: graph.unresolved,
    })
}
