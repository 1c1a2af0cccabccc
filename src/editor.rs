use crate::config::{Config, LayoutConfig};
use crate::geometry::{GeometryProvider, Point, SizeTable};
use crate::history::{
    ActionType, EdgeState, History, HistoryElement, ObjectState, Placement, Snapshot, State, Target,
};
use crate::ir::{Area, AreaStore, Edge, GraphObject, GraphStore, ObjectKind};
use crate::layout::{LayoutReport, ObjectMove, compute_auto_layout};

/// One open document: the store, its history and the geometry used to lay it
/// out. Every mutating action records a [`State`].
#[derive(Debug)]
pub struct Editor<G = SizeTable> {
    store: GraphStore,
    history: History,
    geometry: G,
    layout: LayoutConfig,
}

impl<G: GeometryProvider> Editor<G> {
    pub fn new(store: GraphStore, geometry: G, config: &Config) -> Self {
        Self {
            store,
            history: History::new(config.history.max_size),
            geometry,
            layout: config.layout.clone(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut G {
        &mut self.geometry
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn into_store(self) -> GraphStore {
        self.store
    }

    /// Open another document. History belongs to the previous one and is dropped.
    pub fn load(&mut self, store: GraphStore) {
        self.store = store;
        self.history.clear();
        self.remeasure();
    }

    /// Swap the live collection behind an area. Recorded history keeps
    /// applying to whatever is stored under that area.
    pub fn replace_area(&mut self, area: Area, replacement: AreaStore) -> AreaStore {
        let previous = self.store.replace_area(area, replacement);
        self.remeasure();
        previous
    }

    pub fn run_auto_layout(&mut self, area: Area) -> LayoutReport {
        let Some(layout) = compute_auto_layout(&self.store, area, &self.geometry, &self.layout) else {
            return LayoutReport::default();
        };
        layout.apply(&mut self.store, area);
        self.history
            .add(positions_state(ActionType::AutoLayout, area, &layout.moves));
        let report = layout.report();
        tracing::debug!(area = %area, ?report, "auto layout applied");
        report
    }

    /// Drag an object; members of a boundary follow.
    pub fn move_object(&mut self, area: Area, id: &str, to: Point) -> bool {
        let objects = self.store.area(area);
        let Some(object) = objects.object(id) else {
            return false;
        };
        if object.position() == to {
            return false;
        }
        let mut ids = vec![id.to_string()];
        ids.extend(objects.descendants(id));
        let before: Vec<(String, ObjectKind, Point)> = ids
            .iter()
            .filter_map(|id| objects.object(id))
            .map(|object| (object.id.clone(), object.kind, object.position()))
            .collect();

        self.store.set_position(area, id, to);
        let objects = self.store.area(area);
        let moves: Vec<ObjectMove> = before
            .into_iter()
            .filter_map(|(id, kind, from)| {
                let to = objects.object(&id)?.position();
                Some(ObjectMove { id, kind, from, to })
            })
            .collect();
        self.history.add(positions_state(ActionType::Move, area, &moves));
        true
    }

    /// Edit an object's name or fields. Identity and hierarchy are kept as
    /// they were; use [`Editor::reparent`] to change those.
    pub fn update_object<F>(&mut self, area: Area, id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut GraphObject),
    {
        let Some(before) = self.store.area(area).object(id).cloned() else {
            return false;
        };
        let mut after = before.clone();
        edit(&mut after);
        after.id = before.id.clone();
        after.kind = before.kind;
        after.parent = before.parent.clone();
        after.members = before.members.clone();
        if after == before {
            return false;
        }
        let kind = before.kind;
        self.store.area_mut(area).insert(after.clone());
        self.remeasure();
        self.history.add(objects_state(
            ActionType::Edit,
            area,
            vec![(kind, object_state(id, Some(before)))],
            vec![(kind, object_state(id, Some(after)))],
        ));
        true
    }

    pub fn reparent(&mut self, area: Area, id: &str, parent: Option<&str>) -> bool {
        let objects = self.store.area(area);
        let Some(object) = objects.object(id) else {
            return false;
        };
        let mut touched = vec![id.to_string()];
        touched.extend(object.parent.clone());
        touched.extend(parent.map(str::to_string));
        let before = capture(objects, &touched);

        if !self.store.area_mut(area).reparent(id, parent) {
            return false;
        }
        let after = capture(self.store.area(area), &touched);
        self.remeasure();
        self.history
            .add(objects_state(ActionType::Reparent, area, before, after));
        true
    }

    /// Add an edge. Rejected when the id is taken or an endpoint does not
    /// resolve.
    pub fn connect(&mut self, edge: Edge) -> bool {
        if self.store.edges.get(&edge.id).is_some()
            || self.store.resolve_endpoint(&edge.source).is_none()
            || self.store.resolve_endpoint(&edge.target).is_none()
        {
            tracing::warn!(edge = %edge.id, "connect rejected");
            return false;
        }
        let index = self.store.edges.len();
        let id = edge.id.clone();
        self.store.edges.push(edge.clone());
        self.history.add(edges_state(
            ActionType::Connect,
            EdgeState {
                id: id.clone(),
                index,
                edge: None,
            },
            EdgeState {
                id,
                index,
                edge: Some(edge),
            },
        ));
        true
    }

    pub fn disconnect(&mut self, id: &str) -> bool {
        let Some(index) = self.store.edges.position(id) else {
            return false;
        };
        let Some(edge) = self.store.edges.remove(id) else {
            return false;
        };
        self.history.add(edges_state(
            ActionType::Disconnect,
            EdgeState {
                id: id.to_string(),
                index,
                edge: Some(edge),
            },
            EdgeState {
                id: id.to_string(),
                index,
                edge: None,
            },
        ));
        true
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo(&mut self.store);
        if undone {
            self.remeasure();
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.history.redo(&mut self.store);
        if redone {
            self.remeasure();
        }
        redone
    }

    fn remeasure(&mut self) {
        self.geometry.remeasure(&self.store, &self.layout);
    }
}

fn object_state(id: &str, object: Option<GraphObject>) -> ObjectState {
    ObjectState {
        id: id.to_string(),
        object,
    }
}

fn capture(objects: &AreaStore, ids: &[String]) -> Vec<(ObjectKind, ObjectState)> {
    ids.iter()
        .filter_map(|id| objects.object(id))
        .map(|object| (object.kind, object_state(&object.id, Some(object.clone()))))
        .collect()
}

fn target_for(kind: ObjectKind, area: Area) -> Target {
    match kind {
        ObjectKind::Vertex => Target::Vertices(area),
        ObjectKind::Boundary => Target::Boundaries(area),
    }
}

/// Before/after positions, one element per object kind that moved.
fn positions_state(action: ActionType, area: Area, moves: &[ObjectMove]) -> State {
    let mut state = State::new();
    for kind in [ObjectKind::Vertex, ObjectKind::Boundary] {
        let (old, data): (Vec<_>, Vec<_>) = moves
            .iter()
            .filter(|mv| mv.kind == kind && mv.from != mv.to)
            .map(|mv| {
                (
                    Placement {
                        id: mv.id.clone(),
                        at: mv.from,
                    },
                    Placement {
                        id: mv.id.clone(),
                        at: mv.to,
                    },
                )
            })
            .unzip();
        if old.is_empty() {
            continue;
        }
        state.push(HistoryElement::new(
            action,
            target_for(kind, area),
            Snapshot::Positions(old),
            Snapshot::Positions(data),
        ));
    }
    state
}

fn objects_state(
    action: ActionType,
    area: Area,
    before: Vec<(ObjectKind, ObjectState)>,
    after: Vec<(ObjectKind, ObjectState)>,
) -> State {
    let mut state = State::new();
    for kind in [ObjectKind::Vertex, ObjectKind::Boundary] {
        let pick = |states: &[(ObjectKind, ObjectState)]| -> Vec<ObjectState> {
            states
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, s)| s.clone())
                .collect()
        };
        let old = Snapshot::Objects(pick(&before));
        let data = Snapshot::Objects(pick(&after));
        if old.is_empty() && data.is_empty() {
            continue;
        }
        state.push(HistoryElement::new(action, target_for(kind, area), old, data));
    }
    state
}

fn edges_state(action: ActionType, old: EdgeState, data: EdgeState) -> State {
    State::new().with(HistoryElement::new(
        action,
        Target::Edges,
        Snapshot::Edges(vec![old]),
        Snapshot::Edges(vec![data]),
    ))
}
