use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::config::PortConfig;
use crate::ir::{Area, AreaStore, Edge, GraphStore};

use super::routing::endpoint_y;
use super::types::{Branch, ChildBranch, Column, Connectivity, MappingConstant};

/// Per-object layout state for one analysis run.
#[derive(Debug, Default)]
struct Scratch {
    level: Option<usize>,
    /// `None` until the object has been expanded.
    child: Option<Vec<String>>,
}

/// Derive branch trees for `area` from the edges entering it from the input
/// area and the edges running inside it.
pub fn analyze_connectivity(store: &GraphStore, area: Area, ports: &PortConfig) -> Connectivity {
    let objects = store.area(area);
    let roots = entry_roots(store, area, ports);
    if roots.is_empty() {
        return Connectivity::default();
    }

    let internal = store.edges_between(area, area);
    let scratch = expand(objects, &internal, &roots, ports);

    let mut branches = Vec::with_capacity(roots.len());
    for root in &roots {
        let mut paths = Vec::new();
        let mut expanded = HashSet::new();
        let mut prefix = Vec::new();
        collect_paths(root, &scratch, &mut expanded, &mut prefix, &mut paths);
        let child_branches = prune_dominated(paths)
            .into_iter()
            .map(|path| ChildBranch {
                columns: path.iter().map(|id| Column::new(id)).collect(),
            })
            .collect();
        branches.push(Branch {
            root: root.clone(),
            child_branches,
        });
    }

    let levels: BTreeMap<String, usize> = scratch
        .iter()
        .filter_map(|(id, entry)| entry.level.map(|level| (id.clone(), level)))
        .collect();

    let mut connectivity = Connectivity {
        branches,
        levels,
        constants: Vec::new(),
        unreached: Vec::new(),
    };
    classify_unreached(store, area, ports, &mut connectivity);
    attach_constants(&mut connectivity);
    tracing::debug!(
        area = %area,
        branches = connectivity.branches.len(),
        reached = connectivity.levels.len(),
        constants = connectivity.constants.len(),
        unreached = connectivity.unreached.len(),
        "connectivity analyzed"
    );
    connectivity
}

/// Entry edges sorted by source y, resolved to outermost objects, deduped.
fn entry_roots(store: &GraphStore, area: Area, ports: &PortConfig) -> Vec<String> {
    let objects = store.area(area);
    let mut entries: Vec<(f32, &Edge)> = Vec::new();
    for edge in store.edges_between(Area::Input, area) {
        match endpoint_y(store.area(Area::Input), &edge.source, ports) {
            Some(y) => entries.push((y, edge)),
            None => tracing::warn!(edge = %edge.id, "entry edge source does not resolve; skipped"),
        }
    }
    entries.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut roots: Vec<String> = Vec::new();
    for (_, edge) in entries {
        let Some(root) = resolve_top(objects, edge, false) else {
            tracing::warn!(edge = %edge.id, "entry edge target does not resolve; skipped");
            continue;
        };
        if !roots.iter().any(|seen| seen == root) {
            roots.push(root.to_string());
        }
    }
    roots
}

fn resolve_top<'a>(objects: &'a AreaStore, edge: &Edge, source: bool) -> Option<&'a str> {
    let endpoint = if source { &edge.source } else { &edge.target };
    let owner = objects.endpoint_owner(endpoint)?;
    objects.outermost(&owner.id)
}

/// Worklist expansion from every root at once. Each object is expanded a
/// single time and its level is fixed when first queued, which is its minimum
/// depth since the queue is processed breadth first.
fn expand(
    objects: &AreaStore,
    internal: &[&Edge],
    roots: &[String],
    ports: &PortConfig,
) -> HashMap<String, Scratch> {
    let mut scratch: HashMap<String, Scratch> = HashMap::new();
    let mut queue = VecDeque::new();
    for root in roots {
        scratch.entry(root.clone()).or_default().level = Some(1);
        queue.push_back((root.clone(), 1usize));
    }
    while let Some((id, level)) = queue.pop_front() {
        if scratch.get(&id).is_some_and(|entry| entry.child.is_some()) {
            continue;
        }
        let children = next_objects(objects, internal, &id, ports);
        for child in &children {
            let entry = scratch.entry(child.clone()).or_default();
            if entry.level.is_none() {
                entry.level = Some(level + 1);
                queue.push_back((child.clone(), level + 1));
            }
        }
        scratch.entry(id).or_default().child = Some(children);
    }
    scratch
}

/// Downstream objects of `id` (or of any of its members), ordered by the
/// source endpoint's y.
fn next_objects(objects: &AreaStore, internal: &[&Edge], id: &str, ports: &PortConfig) -> Vec<String> {
    let mut members: HashSet<String> = objects.descendants(id).into_iter().collect();
    members.insert(id.to_string());

    let mut outgoing: Vec<(f32, &Edge)> = internal
        .iter()
        .filter(|edge| {
            objects
                .endpoint_owner(&edge.source)
                .is_some_and(|owner| members.contains(&owner.id))
        })
        .filter_map(|edge| endpoint_y(objects, &edge.source, ports).map(|y| (y, *edge)))
        .collect();
    outgoing.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut children: Vec<String> = Vec::new();
    for (_, edge) in outgoing {
        let Some(target) = resolve_top(objects, edge, false) else {
            tracing::warn!(edge = %edge.id, "edge target does not resolve; skipped");
            continue;
        };
        if target != id && !children.iter().any(|seen| seen == target) {
            children.push(target.to_string());
        }
    }
    children
}

/// Root-to-leaf paths. A path ends early at an object whose subtree was
/// already walked in this branch, and never revisits an object on its own
/// prefix.
fn collect_paths(
    id: &str,
    scratch: &HashMap<String, Scratch>,
    expanded: &mut HashSet<String>,
    prefix: &mut Vec<String>,
    out: &mut Vec<Vec<String>>,
) {
    prefix.push(id.to_string());
    let children: Vec<&String> = scratch
        .get(id)
        .and_then(|entry| entry.child.as_ref())
        .map(|children| {
            children
                .iter()
                .filter(|child| !prefix.contains(child))
                .collect()
        })
        .unwrap_or_default();
    if children.is_empty() || !expanded.insert(id.to_string()) {
        out.push(prefix.clone());
    } else {
        for child in children {
            collect_paths(child, scratch, expanded, prefix, out);
        }
    }
    prefix.pop();
}

/// Drop paths whose objects all appear in another path of the same branch.
fn prune_dominated(paths: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let keep: Vec<bool> = (0..paths.len())
        .map(|i| {
            !(0..paths.len()).any(|j| {
                j != i
                    && paths[i].iter().all(|id| paths[j].contains(id))
                    && (paths[j].len() > paths[i].len() || (paths[j].len() == paths[i].len() && j < i))
            })
        })
        .collect();
    paths
        .into_iter()
        .zip(keep)
        .filter_map(|(path, keep)| keep.then_some(path))
        .collect()
}

/// Split top-level objects not reached from any entry into mapping constants
/// (they feed the output area) and everything else.
fn classify_unreached(store: &GraphStore, area: Area, ports: &PortConfig, connectivity: &mut Connectivity) {
    let objects = store.area(area);
    let outgoing = store.edges_between(area, Area::Output);
    let output = store.area(Area::Output);

    // Output target → first placed object feeding it, in branch order.
    let mut consumers: HashMap<&str, &str> = HashMap::new();
    for id in placement_order(&connectivity.branches) {
        for edge in &outgoing {
            if resolve_top(objects, edge, true) == Some(id) {
                consumers.entry(edge.target.vertex_id.as_str()).or_insert(id);
            }
        }
    }

    let mut constants = Vec::new();
    let mut unreached = Vec::new();
    for object in objects.top_level() {
        if connectivity.levels.contains_key(&object.id) {
            continue;
        }
        let feeds: Vec<&Edge> = outgoing
            .iter()
            .copied()
            .filter(|edge| resolve_top(objects, edge, true) == Some(object.id.as_str()))
            .collect();
        let target_y = feeds
            .iter()
            .filter_map(|edge| endpoint_y(output, &edge.target, ports))
            .min_by(f32::total_cmp);
        match target_y {
            Some(target_y) => {
                let consumer = feeds
                    .iter()
                    .find_map(|edge| consumers.get(edge.target.vertex_id.as_str()))
                    .map(|id| id.to_string());
                constants.push(MappingConstant {
                    id: object.id.clone(),
                    target_y,
                    consumer,
                });
            }
            None => unreached.push((object.y, object.id.clone())),
        }
    }
    constants.sort_by(|a, b| a.target_y.total_cmp(&b.target_y));
    unreached.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    connectivity.constants = constants;
    connectivity.unreached = unreached.into_iter().map(|(_, id)| id).collect();
}

/// Distinct primaries in branch → child-branch → column order.
pub(crate) fn placement_order(branches: &[Branch]) -> Vec<&str> {
    let mut seen = HashSet::new();
    branches
        .iter()
        .flat_map(|branch| branch.child_branches.iter())
        .flat_map(ChildBranch::primaries)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Stack each consumed constant into the first column holding its consumer.
fn attach_constants(connectivity: &mut Connectivity) {
    for constant in &connectivity.constants {
        let Some(consumer) = constant.consumer.as_deref() else {
            continue;
        };
        let column = connectivity
            .branches
            .iter_mut()
            .flat_map(|branch| branch.child_branches.iter_mut())
            .flat_map(|path| path.columns.iter_mut())
            .find(|column| column.primary() == consumer);
        if let Some(column) = column {
            column.objects.push(constant.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Endpoint, GraphObject, ObjectKind};

    fn edge(id: &str, from: (Area, &str, &str), to: (Area, &str, &str)) -> Edge {
        Edge::new(
            id,
            Endpoint::new(from.0, from.1, from.2),
            Endpoint::new(to.0, to.1, to.2),
        )
    }

    fn ops_chain() -> GraphStore {
        let mut store = GraphStore::new();
        store
            .input
            .insert(GraphObject::vertex("in", "in").with_fields(["a", "b", "c"]));
        for id in ["A", "B", "C", "D"] {
            store
                .operations
                .insert(GraphObject::vertex(id, id).with_fields(["x", "y"]));
        }
        store
    }

    fn primaries(branch: &Branch) -> Vec<Vec<&str>> {
        branch
            .child_branches
            .iter()
            .map(|path| path.primaries().collect())
            .collect()
    }

    #[test]
    fn no_entry_edges_yields_nothing() {
        let store = ops_chain();
        let result = analyze_connectivity(&store, Area::Operations, &PortConfig::default());
        assert!(result.is_empty());
        assert!(result.constants.is_empty());
    }

    #[test]
    fn branches_follow_entry_source_order() {
        let mut store = GraphStore::new();
        for (id, y) in [("sa", 10.0), ("sb", 5.0), ("sc", 20.0)] {
            store.input.insert(GraphObject::vertex(id, id).at(0.0, y));
        }
        for id in ["A", "B", "C"] {
            store.operations.insert(GraphObject::vertex(id, id));
        }
        for (src, dst) in [("sa", "A"), ("sb", "B"), ("sc", "C")] {
            store.edges.push(edge(
                &format!("{src}-{dst}"),
                (Area::Input, src, "title"),
                (Area::Operations, dst, "title"),
            ));
        }
        let result = analyze_connectivity(&store, Area::Operations, &PortConfig::default());
        let roots: Vec<_> = result.branches.iter().map(|b| b.root.as_str()).collect();
        assert_eq!(roots, vec!["B", "A", "C"]);
    }

    #[test]
    fn fan_out_builds_one_path_per_child() {
        let mut store = ops_chain();
        store.edges.push(edge("e0", (Area::Input, "in", "0"), (Area::Operations, "A", "0")));
        store.edges.push(edge("e1", (Area::Operations, "A", "1"), (Area::Operations, "C", "0")));
        store.edges.push(edge("e2", (Area::Operations, "A", "0"), (Area::Operations, "B", "0")));
        let result = analyze_connectivity(&store, Area::Operations, &PortConfig::default());
        assert_eq!(result.branches.len(), 1);
        // field 0 sits above field 1, so B comes before C
        assert_eq!(primaries(&result.branches[0]), vec![vec!["A", "B"], vec!["A", "C"]]);
        assert_eq!(result.level("A"), Some(1));
        assert_eq!(result.level("B"), Some(2));
        assert_eq!(result.level("C"), Some(2));
        assert_eq!(result.unreached, vec!["D".to_string()]);
    }

    #[test]
    fn level_is_minimum_depth_and_dominated_paths_are_pruned() {
        let mut store = ops_chain();
        store.edges.push(edge("e0", (Area::Input, "in", "0"), (Area::Operations, "A", "0")));
        store.edges.push(edge("ab", (Area::Operations, "A", "0"), (Area::Operations, "B", "0")));
        store.edges.push(edge("bc", (Area::Operations, "B", "0"), (Area::Operations, "C", "0")));
        store.edges.push(edge("ac", (Area::Operations, "A", "1"), (Area::Operations, "C", "1")));
        let result = analyze_connectivity(&store, Area::Operations, &PortConfig::default());
        assert_eq!(result.level("C"), Some(2));
        assert_eq!(primaries(&result.branches[0]), vec![vec!["A", "B", "C"]]);
    }

    #[test]
    fn cycles_terminate() {
        let mut store = ops_chain();
        store.edges.push(edge("e0", (Area::Input, "in", "0"), (Area::Operations, "A", "0")));
        store.edges.push(edge("ab", (Area::Operations, "A", "0"), (Area::Operations, "B", "0")));
        store.edges.push(edge("bc", (Area::Operations, "B", "0"), (Area::Operations, "C", "0")));
        store.edges.push(edge("ca", (Area::Operations, "C", "1"), (Area::Operations, "A", "1")));
        let result = analyze_connectivity(&store, Area::Operations, &PortConfig::default());
        assert_eq!(primaries(&result.branches[0]), vec![vec!["A", "B", "C"]]);
        assert_eq!(result.level("C"), Some(3));
    }

    #[test]
    fn grouped_targets_resolve_to_outermost_boundary() {
        let mut store = ops_chain();
        store.operations.insert(
            GraphObject::boundary("G", "group").with_members(["B", "C"], ObjectKind::Vertex),
        );
        for id in ["B", "C"] {
            store.operations.vertices.get_mut(id).unwrap().parent = Some("G".into());
        }
        store.edges.push(edge("e0", (Area::Input, "in", "0"), (Area::Operations, "B", "0")));
        store.edges.push(edge("e1", (Area::Input, "in", "1"), (Area::Operations, "C", "0")));
        // an edge leaving a member counts as leaving the group
        store.edges.push(edge("cd", (Area::Operations, "C", "1"), (Area::Operations, "D", "0")));
        let result = analyze_connectivity(&store, Area::Operations, &PortConfig::default());
        assert_eq!(result.branches.len(), 1);
        assert_eq!(primaries(&result.branches[0]), vec![vec!["G", "D"]]);
    }

    #[test]
    fn malformed_edges_are_skipped() {
        let mut store = ops_chain();
        store.edges.push(edge("bad", (Area::Input, "ghost", "0"), (Area::Operations, "A", "0")));
        store.edges.push(edge("e0", (Area::Input, "in", "0"), (Area::Operations, "B", "0")));
        store.edges.push(edge("e1", (Area::Input, "in", "1"), (Area::Operations, "nowhere", "0")));
        store.edges.push(edge("bx", (Area::Operations, "B", "0"), (Area::Operations, "ghost", "0")));
        let result = analyze_connectivity(&store, Area::Operations, &PortConfig::default());
        assert_eq!(result.branches.len(), 1);
        assert_eq!(primaries(&result.branches[0]), vec![vec!["B"]]);
    }

    #[test]
    fn constants_attach_to_consumer_or_go_to_lane() {
        let mut store = ops_chain();
        store.output.insert(GraphObject::vertex("out", "out").with_fields(["p", "q"]));
        store.output.insert(GraphObject::vertex("other", "other").at(0.0, 200.0));
        store.edges.push(edge("e0", (Area::Input, "in", "0"), (Area::Operations, "A", "0")));
        store.edges.push(edge("ao", (Area::Operations, "A", "0"), (Area::Output, "out", "p")));
        // C shares A's output object, D feeds an object nobody else feeds
        store.edges.push(edge("co", (Area::Operations, "C", "0"), (Area::Output, "out", "q")));
        store.edges.push(edge("do", (Area::Operations, "D", "0"), (Area::Output, "other", "title")));
        let result = analyze_connectivity(&store, Area::Operations, &PortConfig::default());

        let ids: Vec<_> = result.constants.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C", "D"]);
        assert_eq!(result.constants[0].consumer.as_deref(), Some("A"));
        assert_eq!(result.constants[1].consumer, None);
        assert_eq!(result.branches[0].child_branches[0].columns[0].objects, vec!["A", "C"]);
        assert_eq!(result.unreached, vec!["B".to_string()]);
        assert_eq!(result.lane().collect::<Vec<_>>(), vec!["D", "B"]);
    }
}
