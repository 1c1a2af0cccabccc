use std::collections::{BTreeMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// `[<owner>::]<slot>`; see [`Endpoint::connection_point`].
static PROP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(?P<owner>.+)::)?(?P<slot>[^:]+)$").unwrap());
static FIELD_INDEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

const GROUP_TITLE_SLOT: &str = "boundary_title";
const ITEM_TITLE_SLOT: &str = "title";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Input,
    Operations,
    Output,
}

impl Area {
    pub const ALL: [Area; 3] = [Area::Input, Area::Operations, Area::Output];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "input" | "in" => Some(Self::Input),
            "operations" | "operation" | "ops" => Some(Self::Operations),
            "output" | "out" => Some(Self::Output),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Operations => "operations",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Vertex,
    Boundary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub id: String,
    pub kind: ObjectKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphObject {
    pub id: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, rename = "member", skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl GraphObject {
    fn new(id: &str, name: &str, kind: ObjectKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            name: name.to_string(),
            x: 0.0,
            y: 0.0,
            parent: None,
            members: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn vertex(id: &str, name: &str) -> Self {
        Self::new(id, name, ObjectKind::Vertex)
    }

    pub fn boundary(id: &str, name: &str) -> Self {
        Self::new(id, name, ObjectKind::Boundary)
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_members<I, S>(mut self, members: I, kind: ObjectKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.extend(members.into_iter().map(|id| MemberRef {
            id: id.into(),
            kind,
        }));
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_boundary(&self) -> bool {
        self.kind == ObjectKind::Boundary
    }
}

/// Where on its owner an edge attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPoint {
    GroupHeader,
    ItemHeader,
    Field(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "svgId")]
    pub area: Area,
    #[serde(rename = "vertexId")]
    pub vertex_id: String,
    #[serde(default = "default_prop")]
    pub prop: String,
}

fn default_prop() -> String {
    ITEM_TITLE_SLOT.to_string()
}

impl Endpoint {
    pub fn new(area: Area, vertex_id: &str, prop: &str) -> Self {
        Self {
            area,
            vertex_id: vertex_id.to_string(),
            prop: prop.to_string(),
        }
    }

    /// Explicit owner named in `prop`, for endpoints addressing a member of
    /// `vertex_id`.
    pub fn prop_owner(&self) -> Option<&str> {
        PROP_RE
            .captures(&self.prop)
            .and_then(|caps| caps.name("owner"))
            .map(|owner| owner.as_str())
    }

    fn slot(&self) -> Option<&str> {
        PROP_RE
            .captures(&self.prop)
            .and_then(|caps| caps.name("slot"))
            .map(|slot| slot.as_str())
    }

    /// Resolve the slot against the object the endpoint lives on.
    pub fn connection_point(&self, owner: &GraphObject) -> Option<ConnectionPoint> {
        let slot = self.slot()?;
        if slot == GROUP_TITLE_SLOT {
            return Some(ConnectionPoint::GroupHeader);
        }
        if slot == ITEM_TITLE_SLOT {
            return Some(if owner.is_boundary() {
                ConnectionPoint::GroupHeader
            } else {
                ConnectionPoint::ItemHeader
            });
        }
        if FIELD_INDEX_RE.is_match(slot) {
            return slot
                .parse()
                .ok()
                .filter(|&index: &usize| index < owner.fields.len())
                .map(ConnectionPoint::Field);
        }
        owner
            .fields
            .iter()
            .position(|field| field == slot)
            .map(ConnectionPoint::Field)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: Endpoint,
    pub target: Endpoint,
}

impl Edge {
    pub fn new(id: &str, source: Endpoint, target: Endpoint) -> Self {
        Self {
            id: id.to_string(),
            source,
            target,
        }
    }
}

/// Objects of one kind in one area, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectCollection(BTreeMap<String, GraphObject>);

impl ObjectCollection {
    pub fn get(&self, id: &str) -> Option<&GraphObject> {
        self.0.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut GraphObject> {
        self.0.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn insert(&mut self, object: GraphObject) -> Option<GraphObject> {
        self.0.insert(object.id.clone(), object)
    }

    pub fn remove(&mut self, id: &str) -> Option<GraphObject> {
        self.0.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphObject> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaStore {
    pub vertices: ObjectCollection,
    pub boundaries: ObjectCollection,
}

impl AreaStore {
    pub fn object(&self, id: &str) -> Option<&GraphObject> {
        self.vertices.get(id).or_else(|| self.boundaries.get(id))
    }

    pub fn object_mut(&mut self, id: &str) -> Option<&mut GraphObject> {
        if self.vertices.contains(id) {
            self.vertices.get_mut(id)
        } else {
            self.boundaries.get_mut(id)
        }
    }

    /// Boundaries first, then vertices, each in id order.
    pub fn objects(&self) -> impl Iterator<Item = &GraphObject> {
        self.boundaries.iter().chain(self.vertices.iter())
    }

    pub fn top_level(&self) -> impl Iterator<Item = &GraphObject> {
        self.objects().filter(|object| {
            object
                .parent
                .as_deref()
                .map(|parent| self.object(parent).is_none())
                .unwrap_or(true)
        })
    }

    pub fn insert(&mut self, object: GraphObject) -> Option<GraphObject> {
        match object.kind {
            ObjectKind::Vertex => self.vertices.insert(object),
            ObjectKind::Boundary => self.boundaries.insert(object),
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len() + self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.boundaries.is_empty()
    }

    /// The object an endpoint lives on: the owner named in `prop` when it
    /// exists in this area, otherwise `vertex_id`.
    pub fn endpoint_owner(&self, endpoint: &Endpoint) -> Option<&GraphObject> {
        endpoint
            .prop_owner()
            .and_then(|owner| self.object(owner))
            .or_else(|| self.object(&endpoint.vertex_id))
    }

    /// Walk `parent` links to the root. Dangling parents end the walk at the
    /// last object that exists.
    pub fn outermost<'a>(&'a self, id: &'a str) -> Option<&'a str> {
        let mut current = self.object(id)?;
        let mut seen = HashSet::new();
        seen.insert(current.id.as_str());
        while let Some(parent) = current.parent.as_deref() {
            let Some(next) = self.object(parent) else {
                break;
            };
            if !seen.insert(next.id.as_str()) {
                break;
            }
            current = next;
        }
        Some(current.id.as_str())
    }

    /// Transitive members of a boundary, in member order (depth first).
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id.to_string());
        self.collect_descendants(id, &mut seen, &mut out);
        out
    }

    fn collect_descendants(&self, id: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        let Some(object) = self.object(id) else {
            return;
        };
        for member in &object.members {
            if self.object(&member.id).is_none() || !seen.insert(member.id.clone()) {
                continue;
            }
            out.push(member.id.clone());
            self.collect_descendants(&member.id, seen, out);
        }
    }

    pub fn is_ancestor_or_self(&self, ancestor: &str, id: &str) -> bool {
        if ancestor == id {
            return true;
        }
        let mut seen = HashSet::new();
        let mut current = self.object(id);
        while let Some(object) = current {
            let Some(parent) = object.parent.as_deref() else {
                return false;
            };
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            current = self.object(parent);
        }
        false
    }

    /// Set one object's position without touching its members.
    pub fn place(&mut self, id: &str, at: Point) -> bool {
        let Some(object) = self.object_mut(id) else {
            return false;
        };
        object.x = at.x;
        object.y = at.y;
        true
    }

    /// Move an object; members of a boundary move by the same delta.
    pub fn set_position(&mut self, id: &str, to: Point) -> bool {
        let Some(from) = self.object(id).map(GraphObject::position) else {
            return false;
        };
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let mut ids = self.descendants(id);
        ids.push(id.to_string());
        for moved in ids {
            if let Some(object) = self.object_mut(&moved) {
                object.x += dx;
                object.y += dy;
            }
        }
        true
    }

    /// Move `id` under `parent` (or to the top level), keeping member lists in
    /// step with parent pointers. Rejects unknown ids, non-boundary parents and
    /// moves that would put a boundary inside itself.
    pub fn reparent(&mut self, id: &str, parent: Option<&str>) -> bool {
        let Some(object) = self.object(id) else {
            return false;
        };
        if object.parent.as_deref() == parent {
            return false;
        }
        let kind = object.kind;
        let old_parent = object.parent.clone();
        if let Some(parent) = parent {
            match self.object(parent) {
                Some(target) if target.is_boundary() => {}
                _ => return false,
            }
            if self.is_ancestor_or_self(id, parent) {
                return false;
            }
        }
        if let Some(old) = old_parent.as_deref()
            && let Some(old) = self.boundaries.get_mut(old)
        {
            old.members.retain(|member| member.id != id);
        }
        if let Some(parent) = parent
            && let Some(new) = self.boundaries.get_mut(parent)
        {
            new.members.push(MemberRef {
                id: id.to_string(),
                kind,
            });
        }
        if let Some(object) = self.object_mut(id) {
            object.parent = parent.map(str::to_string);
        }
        true
    }
}

/// Edges in store order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeList(Vec<Edge>);

impl EdgeList {
    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.0.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Edge> {
        self.0.iter().find(|edge| edge.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|edge| edge.id == id)
    }

    pub fn push(&mut self, edge: Edge) {
        self.0.push(edge);
    }

    pub fn insert(&mut self, index: usize, edge: Edge) {
        let index = index.min(self.0.len());
        self.0.insert(index, edge);
    }

    pub fn replace(&mut self, index: usize, edge: Edge) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = edge;
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Edge> {
        let index = self.position(id)?;
        Some(self.0.remove(index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    pub input: AreaStore,
    pub operations: AreaStore,
    pub output: AreaStore,
    pub edges: EdgeList,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn area(&self, area: Area) -> &AreaStore {
        match area {
            Area::Input => &self.input,
            Area::Operations => &self.operations,
            Area::Output => &self.output,
        }
    }

    pub fn area_mut(&mut self, area: Area) -> &mut AreaStore {
        match area {
            Area::Input => &mut self.input,
            Area::Operations => &mut self.operations,
            Area::Output => &mut self.output,
        }
    }

    pub fn areas(&self) -> impl Iterator<Item = &AreaStore> {
        [&self.input, &self.operations, &self.output].into_iter()
    }

    /// Swap in a freshly loaded area, returning the previous one.
    pub fn replace_area(&mut self, area: Area, replacement: AreaStore) -> AreaStore {
        std::mem::replace(self.area_mut(area), replacement)
    }

    /// Edges leaving `source` and entering `target`, in store order.
    pub fn edges_between(&self, source: Area, target: Area) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|edge| edge.source.area == source && edge.target.area == target)
            .collect()
    }

    pub fn resolve_endpoint(&self, endpoint: &Endpoint) -> Option<&GraphObject> {
        self.area(endpoint.area).endpoint_owner(endpoint)
    }

    pub fn set_position(&mut self, area: Area, id: &str, to: Point) -> bool {
        self.area_mut(area).set_position(id, to)
    }

    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let document: Document = serde_json::from_str(text)?;
        Self::try_from(document)
    }

    pub fn to_document(&self) -> Document {
        let area = |store: &AreaStore| AreaDocument {
            vertices: store.vertices.iter().cloned().collect(),
            boundaries: store.boundaries.iter().cloned().collect(),
        };
        Document {
            input: area(&self.input),
            operations: area(&self.operations),
            output: area(&self.output),
            edges: self.edges.iter().cloned().collect(),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_document())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate object id `{id}` in {area} area")]
    DuplicateObject { area: Area, id: String },
    #[error("object `{id}` in {area} area is listed as a {listed:?} but declares kind {declared:?}")]
    KindMismatch {
        area: Area,
        id: String,
        listed: ObjectKind,
        declared: ObjectKind,
    },
    #[error("object `{id}` in {area} area has parent `{parent}`, which is not a boundary of that area")]
    InvalidParent {
        area: Area,
        id: String,
        parent: String,
    },
    #[error("boundary `{id}` in {area} area lists unknown member `{member}`")]
    UnknownMember {
        area: Area,
        id: String,
        member: String,
    },
}

/// Serialized form of a [`GraphStore`]: object lists per area plus edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub input: AreaDocument,
    #[serde(default)]
    pub operations: AreaDocument,
    #[serde(default)]
    pub output: AreaDocument,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaDocument {
    #[serde(default)]
    pub vertices: Vec<GraphObject>,
    #[serde(default)]
    pub boundaries: Vec<GraphObject>,
}

impl TryFrom<Document> for GraphStore {
    type Error = DocumentError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        let mut store = GraphStore::new();
        for (area, doc) in [
            (Area::Input, document.input),
            (Area::Operations, document.operations),
            (Area::Output, document.output),
        ] {
            *store.area_mut(area) = build_area(area, doc)?;
        }
        for edge in document.edges {
            if store.resolve_endpoint(&edge.source).is_none()
                || store.resolve_endpoint(&edge.target).is_none()
            {
                tracing::warn!(edge = %edge.id, "edge endpoint does not resolve; layout will skip it");
            }
            store.edges.push(edge);
        }
        Ok(store)
    }
}

fn build_area(area: Area, doc: AreaDocument) -> Result<AreaStore, DocumentError> {
    let mut store = AreaStore::default();
    for (listed, objects) in [
        (ObjectKind::Vertex, doc.vertices),
        (ObjectKind::Boundary, doc.boundaries),
    ] {
        for object in objects {
            if object.kind != listed {
                return Err(DocumentError::KindMismatch {
                    area,
                    id: object.id,
                    listed,
                    declared: object.kind,
                });
            }
            if store.object(&object.id).is_some() {
                return Err(DocumentError::DuplicateObject { area, id: object.id });
            }
            store.insert(object);
        }
    }
    for object in store.objects() {
        if let Some(parent) = object.parent.as_deref()
            && !store.boundaries.contains(parent)
        {
            return Err(DocumentError::InvalidParent {
                area,
                id: object.id.clone(),
                parent: parent.to_string(),
            });
        }
        if let Some(member) = object
            .members
            .iter()
            .find(|member| store.object(&member.id).is_none())
        {
            return Err(DocumentError::UnknownMember {
                area,
                id: object.id.clone(),
                member: member.id.clone(),
            });
        }
    }
    Ok(store)
}
