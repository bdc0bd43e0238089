//! The dependency graph: strongly-connected-component condensation over
//! committed instances, producing the order the executor applies them in.
//!
//! The SCC pass is an iterative (non-recursive) Tarjan's algorithm: build a
//! `BTreeSet<(usize, usize)>` adjacency list over small integer vertex
//! indices, walk it with an explicit stack instead of the call stack (so
//! long dependency chains can't blow it), then derive a DAG over the
//! resulting components.
use std::cmp::min;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Bound;

use crate::error::FatalError;
use crate::instance::Instance;

#[derive(Clone)]
struct TarjanVertex {
    index: usize,
    lowlink: usize,
    on_stack: bool,
}

/// Returns, for each vertex `0..n`, the index of the representative vertex
/// of its strongly connected component (the SCC "color").
fn tarjan_scc(n: usize, adj_list: &BTreeSet<(usize, usize)>) -> Vec<usize> {
    let mut state = vec![
        TarjanVertex {
            index: n,
            lowlink: n,
            on_stack: false,
        };
        n
    ];
    let mut color = vec![n; n];
    let mut index = 0;
    let mut stack = Vec::new();

    for start in 0..n {
        if state[start].index != n {
            continue;
        }
        let lower = Bound::Included((start, usize::MIN));
        let upper = Bound::Included((start, usize::MAX));
        let mut recursion = vec![(start, adj_list.range((lower, upper)))];
        state[start].index = index;
        state[start].lowlink = index;
        index += 1;
        stack.push(start);
        state[start].on_stack = true;

        while let Some((v, iter)) = recursion.last_mut() {
            let v = *v;
            if let Some((_src, w)) = iter.next() {
                let w = *w;
                if state[w].index == n {
                    let lower = Bound::Included((w, 0));
                    let upper = Bound::Included((w, usize::MAX));
                    recursion.push((w, adj_list.range((lower, upper))));
                    state[w].index = index;
                    state[w].lowlink = index;
                    index += 1;
                    stack.push(w);
                    state[w].on_stack = true;
                } else if state[w].on_stack {
                    state[v].lowlink = min(state[v].lowlink, state[w].index);
                }
            } else {
                if state[v].lowlink == state[v].index {
                    color[v] = v;
                    while let Some(&top) = stack.last() {
                        if top == v {
                            break;
                        }
                        stack.pop();
                        state[top].on_stack = false;
                        color[top] = v;
                    }
                    stack.pop();
                    state[v].on_stack = false;
                }
                recursion.pop();
                if let Some((parent, _)) = recursion.last() {
                    let parent = *parent;
                    state[parent].lowlink = min(state[parent].lowlink, state[v].lowlink);
                }
            }
        }
    }
    color
}

/// Topological order of a DAG given as vertex ids plus an edge set `u -> v`
/// meaning `u` must be emitted before `v`. `Err` if the edge set is not
/// actually acyclic (a bug in the caller, not an expected runtime state).
fn topo_sort(vertices: &BTreeSet<usize>, edges: &BTreeSet<(usize, usize)>) -> Result<Vec<usize>, FatalError> {
    let mut in_degree: HashMap<usize, usize> = vertices.iter().map(|v| (*v, 0)).collect();
    for (_, v) in edges {
        *in_degree.get_mut(v).expect("edge endpoint must be a known vertex") += 1;
    }
    let initial: BTreeSet<usize> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(v, _)| *v)
        .collect();
    let mut queue: VecDeque<usize> = initial.into_iter().collect();

    let mut order = Vec::with_capacity(vertices.len());
    while let Some(v) = queue.pop_front() {
        order.push(v);
        let mut newly_free = Vec::new();
        for (src, dst) in edges.range((Bound::Included((v, 0)), Bound::Included((v, usize::MAX)))) {
            debug_assert_eq!(*src, v);
            let deg = in_degree.get_mut(dst).unwrap();
            *deg -= 1;
            if *deg == 0 {
                newly_free.push(*dst);
            }
        }
        newly_free.sort_unstable();
        for v in newly_free {
            queue.push_back(v);
        }
    }

    if order.len() != vertices.len() {
        return Err(FatalError::CondensationCycle);
    }
    Ok(order)
}

/// Tracks committed-but-not-yet-executed instances and their dependency
/// edges, and hands back newly eligible instances in deterministic
/// execution order as dependencies close.
#[derive(Default)]
pub struct DependencyGraph {
    committed_seq: HashMap<Instance, i32>,
    edges: HashMap<Instance, BTreeSet<Instance>>,
    executed: HashSet<Instance>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_executed(&self, instance: &Instance) -> bool {
        self.executed.contains(instance)
    }

    /// Committed-but-not-yet-executed vertex count, for a gauge-style metric.
    pub fn committed_vertex_count(&self) -> usize {
        self.committed_seq.len()
    }

    /// Records a commit. Dependencies already executed are dropped; this is
    /// what lets chains with old, already-applied dependencies terminate
    /// instead of growing the graph forever.
    pub fn commit(&mut self, key: Instance, seq: i32, deps: BTreeSet<Instance>) {
        if self.committed_seq.contains_key(&key) || self.executed.contains(&key) {
            return;
        }
        let live_deps: BTreeSet<Instance> = deps
            .into_iter()
            .filter(|d| !self.executed.contains(d))
            .collect();
        self.committed_seq.insert(key, seq);
        self.edges.insert(key, live_deps);
    }

    /// A vertex is eligible once it, and everything reachable from it, is
    /// committed (executed dependencies were already pruned in `commit`).
    fn eligible_vertices(&self) -> BTreeSet<Instance> {
        let mut eligible = BTreeSet::new();
        'outer: for start in self.committed_seq.keys() {
            let mut seen = HashSet::new();
            let mut stack = vec![*start];
            while let Some(cur) = stack.pop() {
                if !seen.insert(cur) {
                    continue;
                }
                if !self.committed_seq.contains_key(&cur) {
                    continue 'outer;
                }
                if let Some(deps) = self.edges.get(&cur) {
                    stack.extend(deps.iter().copied());
                }
            }
            eligible.insert(*start);
        }
        eligible
    }

    /// Computes the newly-executable instances (if any) and marks them
    /// executed, in the deterministic order the executor must apply them.
    pub fn drain_ready(&mut self) -> Result<Vec<Instance>, FatalError> {
        let eligible = self.eligible_vertices();
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        let vertices: Vec<Instance> = eligible.into_iter().collect();
        let index_of: HashMap<Instance, usize> =
            vertices.iter().enumerate().map(|(i, v)| (*v, i)).collect();

        let mut adj: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (v, &vi) in &index_of {
            if let Some(deps) = self.edges.get(v) {
                for d in deps {
                    if let Some(&di) = index_of.get(d) {
                        adj.insert((vi, di));
                    }
                }
            }
        }

        let color = tarjan_scc(vertices.len(), &adj);

        let mut cond_fwd: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (u, v) in &adj {
            if color[*u] != color[*v] {
                cond_fwd.insert((color[*u], color[*v]));
            }
        }
        // Reverse: the original edge u -> v means v is a dependency of u, so
        // v must execute first. Reversing gives an edge set where `a -> b`
        // means "a before b", which is what topo_sort expects.
        let cond_rev: BTreeSet<(usize, usize)> = cond_fwd.iter().map(|(u, v)| (*v, *u)).collect();
        let components: BTreeSet<usize> = color.iter().copied().collect();
        let order = topo_sort(&components, &cond_rev)?;

        let mut result = Vec::with_capacity(vertices.len());
        for comp in order {
            let mut members: Vec<Instance> = (0..vertices.len())
                .filter(|i| color[*i] == comp)
                .map(|i| vertices[i])
                .collect();
            members.sort_by_key(|inst| (self.committed_seq[inst], *inst));
            result.extend(members);
        }

        for inst in &result {
            self.committed_seq.remove(inst);
            self.edges.remove(inst);
            self.executed.insert(*inst);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_non_conflicting_commit_is_immediately_ready() {
        let mut g = DependencyGraph::new();
        g.commit(Instance::new(0, 0), 0, BTreeSet::new());
        let ready = g.drain_ready().unwrap();
        assert_eq!(ready, vec![Instance::new(0, 0)]);
    }

    #[test]
    fn mutually_dependent_pair_forms_one_component_ordered_by_seq() {
        let mut g = DependencyGraph::new();
        let a = Instance::new(0, 0);
        let b = Instance::new(1, 0);
        let mut deps_a = BTreeSet::new();
        deps_a.insert(b);
        let mut deps_b = BTreeSet::new();
        deps_b.insert(a);
        g.commit(a, 0, deps_a);
        g.commit(b, 1, deps_b);
        let ready = g.drain_ready().unwrap();
        assert_eq!(ready, vec![a, b]);
    }

    #[test]
    fn partial_commit_blocks_until_the_dependency_arrives() {
        let mut g = DependencyGraph::new();
        let a = Instance::new(0, 0);
        let b = Instance::new(1, 0);
        let mut deps_a = BTreeSet::new();
        deps_a.insert(b);
        g.commit(a, 0, deps_a);
        assert_eq!(g.drain_ready().unwrap(), Vec::new());
        g.commit(b, 1, BTreeSet::new());
        let ready = g.drain_ready().unwrap();
        assert_eq!(ready, vec![b, a]);
    }

    #[test]
    fn already_executed_dependency_is_dropped_on_commit() {
        let mut g = DependencyGraph::new();
        let i1 = Instance::new(0, 0);
        let i2 = Instance::new(0, 1);
        let i3 = Instance::new(1, 0);
        g.commit(i1, 0, BTreeSet::new());
        assert_eq!(g.drain_ready().unwrap(), vec![i1]);

        let mut deps = BTreeSet::new();
        deps.insert(i1);
        deps.insert(i3);
        g.commit(i2, 1, deps);
        assert_eq!(g.drain_ready().unwrap(), Vec::new());
        g.commit(i3, 2, BTreeSet::new());
        let ready = g.drain_ready().unwrap();
        assert_eq!(ready, vec![i3, i2]);
    }

    #[test]
    fn replaying_a_commit_is_a_no_op() {
        let mut g = DependencyGraph::new();
        let a = Instance::new(0, 0);
        g.commit(a, 0, BTreeSet::new());
        g.commit(a, 999, BTreeSet::new());
        let ready = g.drain_ready().unwrap();
        assert_eq!(ready, vec![a]);
        assert!(g.drain_ready().unwrap().is_empty());
    }

    #[test]
    fn three_way_cycle_collapses_into_a_single_component() {
        let mut g = DependencyGraph::new();
        let a = Instance::new(0, 0);
        let b = Instance::new(1, 0);
        let c = Instance::new(2, 0);
        let mut deps_a = BTreeSet::new();
        deps_a.insert(b);
        let mut deps_b = BTreeSet::new();
        deps_b.insert(c);
        let mut deps_c = BTreeSet::new();
        deps_c.insert(a);
        g.commit(a, 2, deps_a);
        g.commit(b, 0, deps_b);
        g.commit(c, 1, deps_c);
        let mut ready = g.drain_ready().unwrap();
        ready.sort();
        let mut expected = vec![a, b, c];
        expected.sort();
        assert_eq!(ready, expected);
    }
}
