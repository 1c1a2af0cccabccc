use std::collections::HashMap;

use crate::config::PortConfig;
use crate::geometry::{GeometryProvider, Point, Rect, Size};
use crate::ir::{Area, AreaStore, Edge, Endpoint, GraphStore};

use super::routing::{Role, connection_point_at};
use super::types::ObjectMove;

/// Read-only view of the store plus scratch positions for the area being
/// arranged. Nothing is written back until [`Scene::into_moves`].
pub(crate) struct Scene<'a, G: ?Sized> {
    store: &'a GraphStore,
    area: Area,
    geometry: &'a G,
    ports: &'a PortConfig,
    positions: HashMap<String, Point>,
}

impl<'a, G: GeometryProvider + ?Sized> Scene<'a, G> {
    pub(crate) fn new(store: &'a GraphStore, area: Area, geometry: &'a G, ports: &'a PortConfig) -> Self {
        let positions = store
            .area(area)
            .objects()
            .map(|object| (object.id.clone(), object.position()))
            .collect();
        Self {
            store,
            area,
            geometry,
            ports,
            positions,
        }
    }

    pub(crate) fn store(&self) -> &'a GraphStore {
        self.store
    }

    pub(crate) fn objects(&self) -> &'a AreaStore {
        self.store.area(self.area)
    }

    pub(crate) fn position(&self, id: &str) -> Option<Point> {
        self.positions.get(id).copied()
    }

    pub(crate) fn size(&self, id: &str) -> Size {
        self.geometry.measure(id).unwrap_or_default()
    }

    pub(crate) fn rect(&self, id: &str) -> Option<Rect> {
        self.position(id).map(|at| Rect::new(at, self.size(id)))
    }

    /// Move a top-level object; its members follow.
    pub(crate) fn move_to(&mut self, id: &str, to: Point) {
        let Some(from) = self.position(id) else {
            return;
        };
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        self.positions.insert(id.to_string(), to);
        for member in self.objects().descendants(id) {
            if let Some(at) = self.positions.get_mut(&member) {
                at.x += dx;
                at.y += dy;
            }
        }
    }

    /// Drawn coordinate of an endpoint. Endpoints in other areas read the
    /// store directly since only this area is being rearranged.
    pub(crate) fn endpoint_point(&self, endpoint: &Endpoint, role: Role) -> Option<Point> {
        let owner = self.store.resolve_endpoint(endpoint)?;
        let point = endpoint.connection_point(owner)?;
        let origin = if endpoint.area == self.area {
            self.position(&owner.id)?
        } else {
            owner.position()
        };
        Some(connection_point_at(origin, self.size(&owner.id), point, role, self.ports))
    }

    pub(crate) fn edge_segment(&self, edge: &Edge) -> Option<(Point, Point)> {
        Some((
            self.endpoint_point(&edge.source, Role::Source)?,
            self.endpoint_point(&edge.target, Role::Target)?,
        ))
    }

    pub(crate) fn into_moves(self) -> Vec<ObjectMove> {
        let area = self.objects();
        area.objects()
            .filter_map(|object| {
                let to = self.positions.get(&object.id).copied()?;
                let from = object.position();
                (from != to).then(|| ObjectMove {
                    id: object.id.clone(),
                    kind: object.kind,
                    from,
                    to,
                })
            })
            .collect()
    }
}
