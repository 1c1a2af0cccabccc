//! Linear undo/redo history.
//!
//! Each [`State`] is one user-visible action made of one or more
//! [`HistoryElement`]s. Elements name the live collaborator they apply to by a
//! stable [`Target`] that is resolved through a [`CollaboratorTable`] when the
//! element is applied, so replacing a collaborator (for example reloading an
//! area) never leaves history pointing at a stale object.

use std::collections::VecDeque;

use serde::Serialize;

use crate::geometry::Point;
use crate::ir::{Area, Edge, EdgeList, GraphObject, GraphStore, ObjectCollection};

pub const DEFAULT_MAX_SIZE: usize = 100;

/// Stable id of a live collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Target {
    Vertices(Area),
    Boundaries(Area),
    Edges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Move,
    Edit,
    Reparent,
    Connect,
    Disconnect,
    AutoLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub id: String,
    pub at: Point,
}

/// `None` means the object does not exist in this snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectState {
    pub id: String,
    pub object: Option<GraphObject>,
}

/// `None` means the edge does not exist; `index` is where it is restored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeState {
    pub id: String,
    pub index: usize,
    pub edge: Option<Edge>,
}

/// Opaque state a collaborator knows how to restore.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Snapshot {
    Positions(Vec<Placement>),
    Objects(Vec<ObjectState>),
    Edges(Vec<EdgeState>),
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Positions(items) => items.is_empty(),
            Self::Objects(items) => items.is_empty(),
            Self::Edges(items) => items.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryElement {
    pub action: ActionType,
    pub old: Snapshot,
    pub data: Snapshot,
    pub target: Target,
}

impl HistoryElement {
    pub fn new(action: ActionType, target: Target, old: Snapshot, data: Snapshot) -> Self {
        Self {
            action,
            old,
            data,
            target,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct State {
    elements: Vec<HistoryElement>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, element: HistoryElement) -> Self {
        self.push(element);
        self
    }

    pub fn push(&mut self, element: HistoryElement) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[HistoryElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn revert<T: CollaboratorTable + ?Sized>(&self, table: &mut T) {
        for element in self.elements.iter().rev() {
            apply_to(table, element.target, &element.old);
        }
    }

    fn reapply<T: CollaboratorTable + ?Sized>(&self, table: &mut T) {
        for element in &self.elements {
            apply_to(table, element.target, &element.data);
        }
    }
}

fn apply_to<T: CollaboratorTable + ?Sized>(table: &mut T, target: Target, snapshot: &Snapshot) {
    match table.resolve(target) {
        Some(collaborator) => collaborator.apply(snapshot),
        None => tracing::warn!(?target, "history target does not resolve; element skipped"),
    }
}

/// A live object that can restore a snapshot onto itself.
pub trait Collaborator {
    fn apply(&mut self, snapshot: &Snapshot);
}

/// Maps stable targets to the collaborators currently behind them.
pub trait CollaboratorTable {
    fn resolve(&mut self, target: Target) -> Option<&mut dyn Collaborator>;
}

impl Collaborator for ObjectCollection {
    fn apply(&mut self, snapshot: &Snapshot) {
        match snapshot {
            Snapshot::Positions(placements) => {
                for placement in placements {
                    if let Some(object) = self.get_mut(&placement.id) {
                        object.x = placement.at.x;
                        object.y = placement.at.y;
                    }
                }
            }
            Snapshot::Objects(states) => {
                for state in states {
                    match &state.object {
                        Some(object) => {
                            self.insert(object.clone());
                        }
                        None => {
                            self.remove(&state.id);
                        }
                    }
                }
            }
            Snapshot::Edges(_) => tracing::warn!("edge snapshot applied to an object collection"),
        }
    }
}

impl Collaborator for EdgeList {
    fn apply(&mut self, snapshot: &Snapshot) {
        let Snapshot::Edges(states) = snapshot else {
            tracing::warn!("object snapshot applied to the edge list");
            return;
        };
        for state in states {
            match (&state.edge, self.position(&state.id)) {
                (Some(edge), Some(index)) => self.replace(index, edge.clone()),
                (Some(edge), None) => self.insert(state.index, edge.clone()),
                (None, Some(_)) => {
                    self.remove(&state.id);
                }
                (None, None) => {}
            }
        }
    }
}

impl CollaboratorTable for GraphStore {
    fn resolve(&mut self, target: Target) -> Option<&mut dyn Collaborator> {
        let collaborator: &mut dyn Collaborator = match target {
            Target::Vertices(area) => &mut self.area_mut(area).vertices,
            Target::Boundaries(area) => &mut self.area_mut(area).boundaries,
            Target::Edges => &mut self.edges,
        };
        Some(collaborator)
    }
}

#[derive(Debug, Clone)]
pub struct History {
    states: VecDeque<State>,
    /// Last applied state; `None` before the first one.
    cursor: Option<usize>,
    max_size: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            states: VecDeque::new(),
            cursor: None,
            max_size,
        }
    }

    /// Record an action that has already been applied to the store. Empty
    /// states are ignored. Anything after the cursor is dropped first.
    pub fn add(&mut self, state: State) {
        if state.is_empty() || self.max_size == 0 {
            return;
        }
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        self.states.truncate(keep);
        self.states.push_back(state);
        while self.states.len() > self.max_size {
            self.states.pop_front();
        }
        self.cursor = Some(self.states.len() - 1);
        tracing::debug!(len = self.states.len(), cursor = ?self.cursor, "history add");
    }

    pub fn undo<T: CollaboratorTable + ?Sized>(&mut self, table: &mut T) -> bool {
        let Some(cursor) = self.cursor else {
            return false;
        };
        if self.states.is_empty() {
            return false;
        }
        let cursor = cursor.min(self.states.len() - 1);
        self.states[cursor].revert(table);
        self.cursor = cursor.checked_sub(1);
        tracing::debug!(cursor = ?self.cursor, "history undo");
        true
    }

    pub fn redo<T: CollaboratorTable + ?Sized>(&mut self, table: &mut T) -> bool {
        if !self.can_redo() {
            return false;
        }
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        self.cursor = Some(next);
        self.states[next].reapply(table);
        tracing::debug!(cursor = ?self.cursor, "history redo");
        true
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.cursor = None;
    }

    /// Point every element recorded against `old` at `new`. Returns how many
    /// elements changed.
    pub fn retarget(&mut self, old: Target, new: Target) -> usize {
        let mut changed = 0;
        for element in self.states.iter_mut().flat_map(|state| state.elements.iter_mut()) {
            if element.target == old {
                element.target = new;
                changed += 1;
            }
        }
        changed
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some() && !self.states.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        match self.cursor {
            Some(cursor) => cursor + 1 < self.states.len(),
            None => !self.states.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Endpoint;

    fn store() -> GraphStore {
        let mut store = GraphStore::new();
        store.operations.insert(GraphObject::vertex("a", "a"));
        store
    }

    fn move_a(from: f32, to: f32) -> State {
        let target = Target::Vertices(Area::Operations);
        let at = |x: f32| {
            Snapshot::Positions(vec![Placement {
                id: "a".into(),
                at: Point::new(x, 0.0),
            }])
        };
        State::new().with(HistoryElement::new(ActionType::Move, target, at(from), at(to)))
    }

    fn x_of_a(store: &GraphStore) -> f32 {
        store.operations.object("a").unwrap().x
    }

    fn record(history: &mut History, store: &mut GraphStore, from: f32, to: f32) {
        let state = move_a(from, to);
        state.reapply(store);
        history.add(state);
    }

    #[test]
    fn empty_state_is_not_recorded() {
        let mut history = History::default();
        history.add(State::new());
        assert!(history.is_empty());
        assert_eq!(history.current_index(), None);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut history = History::new(3);
        for step in 0..5 {
            history.add(move_a(step as f32, step as f32 + 1.0));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.current_index(), Some(2));
        let first = history.states().next().unwrap();
        assert_eq!(first, &move_a(2.0, 3.0));
    }

    #[test]
    fn undo_then_redo_restores_positions() {
        let mut store = store();
        let mut history = History::default();
        record(&mut history, &mut store, 0.0, 40.0);
        assert_eq!(x_of_a(&store), 40.0);

        assert!(history.undo(&mut store));
        assert_eq!(x_of_a(&store), 0.0);
        assert!(history.redo(&mut store));
        assert_eq!(x_of_a(&store), 40.0);
        assert!(!history.redo(&mut store));
    }

    #[test]
    fn undo_at_the_start_does_nothing() {
        let mut store = store();
        let mut history = History::default();
        assert!(!history.undo(&mut store));
        record(&mut history, &mut store, 0.0, 10.0);
        assert!(history.undo(&mut store));
        assert!(!history.undo(&mut store));
        assert!(!history.undo(&mut store));
        assert_eq!(history.current_index(), None);
        assert_eq!(x_of_a(&store), 0.0);
    }

    #[test]
    fn new_action_prunes_redo_branch() {
        let mut store = store();
        let mut history = History::default();
        record(&mut history, &mut store, 0.0, 1.0);
        record(&mut history, &mut store, 1.0, 2.0);
        assert!(history.undo(&mut store));
        record(&mut history, &mut store, 1.0, 3.0);

        let states: Vec<_> = history.states().cloned().collect();
        assert_eq!(states, vec![move_a(0.0, 1.0), move_a(1.0, 3.0)]);
        assert_eq!(history.current_index(), Some(1));
        assert!(!history.redo(&mut store));
        assert_eq!(x_of_a(&store), 3.0);
    }

    #[test]
    fn elements_revert_in_reverse_order() {
        let mut store = GraphStore::new();
        let target = Target::Vertices(Area::Operations);
        let created = GraphObject::vertex("v", "v");
        let moved = created.clone().at(5.0, 5.0);
        let state = State::new()
            .with(HistoryElement::new(
                ActionType::Edit,
                target,
                Snapshot::Objects(vec![ObjectState { id: "v".into(), object: None }]),
                Snapshot::Objects(vec![ObjectState {
                    id: "v".into(),
                    object: Some(created),
                }]),
            ))
            .with(HistoryElement::new(
                ActionType::Move,
                target,
                Snapshot::Positions(vec![Placement { id: "v".into(), at: Point::new(0.0, 0.0) }]),
                Snapshot::Positions(vec![Placement { id: "v".into(), at: moved.position() }]),
            ));
        state.reapply(&mut store);
        assert_eq!(store.operations.object("v"), Some(&moved));
        state.revert(&mut store);
        assert!(store.operations.object("v").is_none());
    }

    #[test]
    fn edge_snapshots_restore_order() {
        let mut store = GraphStore::new();
        let edge = |id: &str| {
            Edge::new(
                id,
                Endpoint::new(Area::Input, "a", "title"),
                Endpoint::new(Area::Operations, "b", "title"),
            )
        };
        for id in ["e1", "e2", "e3"] {
            store.edges.push(edge(id));
        }
        let removed = store.edges.remove("e2").unwrap();
        let mut history = History::default();
        history.add(State::new().with(HistoryElement::new(
            ActionType::Disconnect,
            Target::Edges,
            Snapshot::Edges(vec![EdgeState { id: "e2".into(), index: 1, edge: Some(removed) }]),
            Snapshot::Edges(vec![EdgeState { id: "e2".into(), index: 1, edge: None }]),
        )));
        assert!(history.undo(&mut store));
        assert_eq!(store.edges.position("e2"), Some(1));
        assert!(history.redo(&mut store));
        assert!(store.edges.get("e2").is_none());
        assert_eq!(store.edges.len(), 2);
    }

    #[test]
    fn retarget_redirects_recorded_elements() {
        let mut store = GraphStore::new();
        store.output.insert(GraphObject::vertex("a", "a"));
        let mut history = History::default();
        history.add(move_a(5.0, 7.0));
        assert_eq!(
            history.retarget(Target::Vertices(Area::Operations), Target::Vertices(Area::Output)),
            1
        );
        assert!(history.undo(&mut store));
        assert_eq!(store.output.object("a").unwrap().x, 5.0);
    }

    #[test]
    fn clear_resets_cursor() {
        let mut history = History::default();
        history.add(move_a(0.0, 1.0));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.current_index(), None);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut history = History::new(0);
        history.add(move_a(0.0, 1.0));
        assert!(history.is_empty());
    }
}
