use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::ir::{AreaStore, GraphObject, GraphStore, ObjectKind};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned box in area coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(origin: Point, size: Size) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Boxes that merely touch, or overlap by no more than `tolerance` on
    /// either axis, do not count as overlapping.
    pub fn overlaps(&self, other: &Rect, tolerance: f32) -> bool {
        self.x < other.right() - tolerance
            && other.x < self.right() - tolerance
            && self.y < other.bottom() - tolerance
            && other.y < self.bottom() - tolerance
    }

    /// Top, right, bottom and left sides as segments.
    pub fn sides(&self) -> [(Point, Point); 4] {
        let tl = Point::new(self.x, self.y);
        let tr = Point::new(self.right(), self.y);
        let br = Point::new(self.right(), self.bottom());
        let bl = Point::new(self.x, self.bottom());
        [(tl, tr), (tr, br), (br, bl), (bl, tl)]
    }
}

/// Source of rendered object sizes. The layout engine only reads sizes; it
/// must not run before every object it touches has been measured once.
pub trait GeometryProvider {
    fn measure(&self, id: &str) -> Option<Size>;

    /// Called after objects were added, removed or restructured. Providers
    /// that are fed rendered sizes from outside keep what they have.
    fn remeasure(&mut self, _store: &GraphStore, _config: &LayoutConfig) {}
}

impl<T: GeometryProvider + ?Sized> GeometryProvider for &T {
    fn measure(&self, id: &str) -> Option<Size> {
        (**self).measure(id)
    }
}

/// Plain id → size table. Used directly by embedders that already know their
/// rendered sizes, and by [`SizeTable::declared`] for headless runs.
#[derive(Debug, Clone, Default)]
pub struct SizeTable {
    sizes: HashMap<String, Size>,
    /// Derived from the document, so it can be derived again.
    declared: bool,
}

impl SizeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, size: Size) {
        self.sizes.insert(id.into(), size);
    }

    pub fn with(mut self, id: impl Into<String>, width: f32, height: f32) -> Self {
        self.insert(id, Size::new(width, height));
        self
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Sizes derived from the declared structure of every object: vertices are
    /// a header plus one row per field, boundaries wrap their members stacked
    /// vertically.
    pub fn declared(store: &GraphStore, config: &LayoutConfig) -> Self {
        let mut table = Self::new();
        table.refresh(store, config);
        table
    }

    /// Recompute every declared size, e.g. after fields were added or removed.
    pub fn refresh(&mut self, store: &GraphStore, config: &LayoutConfig) {
        self.sizes.clear();
        self.declared = true;
        for area in store.areas() {
            for object in area.objects() {
                if self.sizes.contains_key(&object.id) {
                    continue;
                }
                let mut visiting = HashSet::new();
                declared_size(area, object, config, &mut self.sizes, &mut visiting);
            }
        }
    }
}

impl GeometryProvider for SizeTable {
    fn measure(&self, id: &str) -> Option<Size> {
        self.sizes.get(id).copied()
    }

    fn remeasure(&mut self, store: &GraphStore, config: &LayoutConfig) {
        if self.declared {
            self.refresh(store, config);
        }
    }
}

fn declared_size(
    area: &AreaStore,
    object: &GraphObject,
    config: &LayoutConfig,
    sizes: &mut HashMap<String, Size>,
    visiting: &mut HashSet<String>,
) -> Size {
    if let Some(size) = sizes.get(&object.id) {
        return *size;
    }
    let ports = &config.ports;
    let sizing = &config.sizing;
    let size = match object.kind {
        ObjectKind::Vertex => Size::new(
            sizing.vertex_width,
            ports.header_height + object.fields.len() as f32 * ports.row_height,
        ),
        ObjectKind::Boundary => {
            if !visiting.insert(object.id.clone()) {
                // Member cycle; measure as an empty group.
                return Size::new(sizing.min_boundary_width, ports.group_header_height);
            }
            let pad = sizing.boundary_padding;
            let mut width = 0.0f32;
            let mut height = ports.group_header_height + pad;
            for member in &object.members {
                let Some(child) = area.object(&member.id) else {
                    continue;
                };
                let child_size = declared_size(area, child, config, sizes, visiting);
                width = width.max(child_size.width);
                height += child_size.height + pad;
            }
            visiting.remove(&object.id);
            Size::new((width + pad * 2.0).max(sizing.min_boundary_width), height)
        }
    };
    sizes.insert(object.id.clone(), size);
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Area, GraphObject};

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = Rect::new(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let b = Rect::new(Point::new(10.0, 0.0), Size::new(10.0, 10.0));
        assert!(!a.overlaps(&b, 0.0));
    }

    #[test]
    fn overlap_within_tolerance_is_ignored() {
        let a = Rect::new(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let b = Rect::new(Point::new(0.0, 9.0), Size::new(10.0, 10.0));
        assert!(!a.overlaps(&b, 2.0));
        assert!(a.overlaps(&b, 0.5));
    }

    #[test]
    fn declared_boundary_wraps_members() {
        let config = LayoutConfig::default();
        let mut store = GraphStore::new();
        let ops = store.area_mut(Area::Operations);
        ops.insert(
            GraphObject::vertex("v1", "first")
                .with_fields(["a", "b"])
                .with_parent("g"),
        );
        ops.insert(GraphObject::vertex("v2", "second").with_parent("g"));
        ops.insert(GraphObject::boundary("g", "group").with_members(["v1", "v2"], ObjectKind::Vertex));
        let table = SizeTable::declared(&store, &config);

        let v1 = table.measure("v1").unwrap();
        assert_eq!(
            v1.height,
            config.ports.header_height + 2.0 * config.ports.row_height
        );
        let group = table.measure("g").unwrap();
        let v2 = table.measure("v2").unwrap();
        let pad = config.sizing.boundary_padding;
        assert_eq!(
            group.height,
            config.ports.group_header_height + v1.height + v2.height + pad * 3.0
        );
        assert!(group.width >= v1.width + pad * 2.0);
    }

    #[test]
    fn remeasure_follows_declared_structure_only() {
        let config = LayoutConfig::default();
        let mut store = GraphStore::new();
        store.operations.insert(GraphObject::vertex("v", "v"));
        let mut declared = SizeTable::declared(&store, &config);
        let mut explicit = SizeTable::new().with("v", 10.0, 10.0);

        store
            .operations
            .insert(GraphObject::vertex("v", "v").with_fields(["a", "b"]));
        store.operations.insert(GraphObject::vertex("w", "w"));
        declared.remeasure(&store, &config);
        explicit.remeasure(&store, &config);

        let height = config.ports.header_height + 2.0 * config.ports.row_height;
        assert_eq!(declared.measure("v").map(|size| size.height), Some(height));
        assert!(declared.measure("w").is_some());
        assert_eq!(explicit.measure("v"), Some(Size::new(10.0, 10.0)));
        assert_eq!(explicit.measure("w"), None);
    }
}
