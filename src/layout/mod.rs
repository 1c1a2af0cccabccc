mod connectivity;
mod placement;
mod routing;
mod scene;
pub(crate) mod types;

pub use connectivity::analyze_connectivity;
pub use routing::Role;
pub use types::*;

use crate::config::{LayoutConfig, PortConfig};
use crate::geometry::{GeometryProvider, Point};
use crate::ir::{Area, Edge, GraphStore};

use routing::connection_point_at;
use scene::Scene;

/// Analyze `area` and compute new positions for its objects without touching
/// the store. `None` when no edge enters the area from the input side.
pub fn compute_auto_layout<G: GeometryProvider + ?Sized>(
    store: &GraphStore,
    area: Area,
    geometry: &G,
    config: &LayoutConfig,
) -> Option<AutoLayout> {
    let connectivity = analyze_connectivity(store, area, &config.ports);
    if connectivity.is_empty() {
        tracing::debug!(area = %area, "no entry edges; layout skipped");
        return None;
    }

    let mut scene = Scene::new(store, area, geometry, &config.ports);
    let placed = placement::arrange(&mut scene, &connectivity, area, config);
    let moves = scene.into_moves();
    tracing::debug!(
        area = %area,
        branch_objects = placed.branch_objects.len(),
        lane_objects = placed.lane_objects.len(),
        crossing_repairs = placed.crossing_repairs,
        moves = moves.len(),
        "auto layout computed"
    );
    Some(AutoLayout { connectivity, moves })
}

impl AutoLayout {
    /// Write every move into `area`. Moves already include members, so each
    /// object is set directly.
    pub fn apply(&self, store: &mut GraphStore, area: Area) {
        let objects = store.area_mut(area);
        for mv in &self.moves {
            objects.place(&mv.id, mv.to);
        }
    }

    pub fn report(&self) -> LayoutReport {
        let attached_constants = self
            .connectivity
            .constants
            .iter()
            .filter(|constant| constant.consumer.is_some())
            .count();
        LayoutReport {
            branches: self.connectivity.branches.len(),
            attached_constants,
            lane_objects: self.connectivity.lane().count(),
            moved: self.moves.len(),
        }
    }
}

/// Drawn segment of an edge from the positions currently in the store.
pub fn edge_segment<G: GeometryProvider + ?Sized>(
    store: &GraphStore,
    geometry: &G,
    ports: &PortConfig,
    edge: &Edge,
) -> Option<(Point, Point)> {
    let end = |role: Role| {
        let endpoint = match role {
            Role::Source => &edge.source,
            Role::Target => &edge.target,
        };
        let owner = store.resolve_endpoint(endpoint)?;
        let point = endpoint.connection_point(owner)?;
        let size = geometry.measure(&owner.id).unwrap_or_default();
        Some(connection_point_at(owner.position(), size, point, role, ports))
    };
    Some((end(Role::Source)?, end(Role::Target)?))
}
