use crate::config::PortConfig;
use crate::geometry::{Point, Rect, Size};
use crate::ir::{AreaStore, ConnectionPoint, Endpoint};

const PARALLEL_EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Leaves the owner's right edge.
    Source,
    /// Enters the owner's left edge.
    Target,
}

pub(crate) fn connection_offset_y(point: ConnectionPoint, ports: &PortConfig) -> f32 {
    match point {
        ConnectionPoint::GroupHeader => ports.group_header_height / 2.0,
        ConnectionPoint::ItemHeader => ports.header_height / 2.0,
        ConnectionPoint::Field(index) => {
            ports.header_height + index as f32 * ports.row_height + ports.row_height / 2.0
        }
    }
}

pub(crate) fn connection_point_at(
    origin: Point,
    size: Size,
    point: ConnectionPoint,
    role: Role,
    ports: &PortConfig,
) -> Point {
    let x = match role {
        Role::Source => origin.x + size.width,
        Role::Target => origin.x,
    };
    Point::new(x, origin.y + connection_offset_y(point, ports))
}

/// Vertical position of an endpoint using the positions stored in `area`.
/// `None` when the endpoint is malformed.
pub(crate) fn endpoint_y(area: &AreaStore, endpoint: &Endpoint, ports: &PortConfig) -> Option<f32> {
    let owner = area.endpoint_owner(endpoint)?;
    let point = endpoint.connection_point(owner)?;
    Some(owner.y + connection_offset_y(point, ports))
}

/// Intersection of segments `a1→a2` and `b1→b2`. Parallel and coincident
/// segments report no intersection.
pub(crate) fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let r = (a2.x - a1.x, a2.y - a1.y);
    let s = (b2.x - b1.x, b2.y - b1.y);
    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() <= PARALLEL_EPS {
        return None;
    }
    let qp = (b1.x - a1.x, b1.y - a1.y);
    let t = (qp.0 * s.1 - qp.1 * s.0) / denom;
    let u = (qp.0 * r.1 - qp.1 * r.0) / denom;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }
    Some(Point::new(a1.x + t * r.0, a1.y + t * r.1))
}

/// Lowest point where the segment crosses one of the box's four sides.
pub(crate) fn lowest_crossing(from: Point, to: Point, rect: &Rect) -> Option<Point> {
    rect.sides()
        .iter()
        .filter_map(|(s0, s1)| segment_intersection(from, to, *s0, *s1))
        .max_by(|a, b| a.y.total_cmp(&b.y))
}
