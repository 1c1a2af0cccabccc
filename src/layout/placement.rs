use std::collections::{HashMap, HashSet};

use crate::config::LayoutConfig;
use crate::geometry::{GeometryProvider, Point, Rect};
use crate::ir::Area;

use super::routing::lowest_crossing;
use super::scene::Scene;
use super::types::{Branch, Connectivity};

/// Position of an object inside the branch structure: branch, child branch,
/// column, index within the column.
type Slot = (usize, usize, usize, usize);

pub(crate) struct Placed {
    /// Top-level objects positioned by the branch pass.
    pub(crate) branch_objects: Vec<String>,
    pub(crate) lane_objects: Vec<String>,
    pub(crate) crossing_repairs: usize,
}

/// Arrange every branch, then pack the lane. Writes only to `scene`.
pub(crate) fn arrange<G: GeometryProvider + ?Sized>(
    scene: &mut Scene<'_, G>,
    connectivity: &Connectivity,
    area: Area,
    config: &LayoutConfig,
) -> Placed {
    let owners = owner_slots(&connectivity.branches);
    let band_width = owners
        .keys()
        .map(|id| scene.size(id).width)
        .fold(config.group_width, f32::max);
    let bands = Bands {
        width: band_width,
        gap: config.column_gap,
    };

    let mut top = config.top;
    let mut crossing_repairs = 0;
    for (index, branch) in connectivity.branches.iter().enumerate() {
        let pass = BranchPass {
            index,
            branch,
            connectivity,
            owners: &owners,
            bands: &bands,
            config,
        };
        let (bottom, repairs) = pass.run(scene, area, top);
        crossing_repairs += repairs;
        top = bottom + config.branch_gap;
        tracing::debug!(root = %branch.root, bottom, repairs, "branch placed");
    }

    let mut branch_objects: Vec<String> = owners.into_iter().map(|(id, _)| id).collect();
    branch_objects.sort();
    let lane_objects = pack_lane(scene, connectivity, &branch_objects, config);
    Placed {
        branch_objects,
        lane_objects,
        crossing_repairs,
    }
}

/// First occurrence of every object in branch order. Only that slot places it.
fn owner_slots(branches: &[Branch]) -> HashMap<String, Slot> {
    let mut owners = HashMap::new();
    for (b, branch) in branches.iter().enumerate() {
        for (p, path) in branch.child_branches.iter().enumerate() {
            for (c, column) in path.columns.iter().enumerate() {
                for (k, id) in column.objects.iter().enumerate() {
                    owners.entry(id.clone()).or_insert((b, p, c, k));
                }
            }
        }
    }
    owners
}

struct Bands {
    width: f32,
    gap: f32,
}

impl Bands {
    fn x(&self, level: usize) -> f32 {
        let level = level.max(1);
        (level - 1) as f32 * self.width + level as f32 * self.gap
    }
}

struct BranchPass<'p> {
    index: usize,
    branch: &'p Branch,
    connectivity: &'p Connectivity,
    owners: &'p HashMap<String, Slot>,
    bands: &'p Bands,
    config: &'p LayoutConfig,
}

impl BranchPass<'_> {
    fn owns(&self, id: &str, slot: Slot) -> bool {
        self.owners.get(id) == Some(&slot)
    }

    /// Place, then repeatedly push auxiliary objects below edges that cross
    /// them. Returns the branch bottom and the number of repairs made.
    fn run<G: GeometryProvider + ?Sized>(&self, scene: &mut Scene<'_, G>, area: Area, top: f32) -> (f32, usize) {
        let mut nudges: HashMap<String, f32> = HashMap::new();
        let mut bottom = self.place(scene, top, &nudges);
        let mut repairs = 0;
        while repairs < self.config.max_crossing_repairs {
            let Some((id, drop)) = self.first_crossing(scene, area) else {
                break;
            };
            *nudges.entry(id).or_default() += drop;
            repairs += 1;
            bottom = self.place(scene, top, &nudges);
        }
        (bottom, repairs)
    }

    fn place<G: GeometryProvider + ?Sized>(
        &self,
        scene: &mut Scene<'_, G>,
        top: f32,
        nudges: &HashMap<String, f32>,
    ) -> f32 {
        let row_gap = self.config.row_gap;
        let nudge = |id: &str| nudges.get(id).copied().unwrap_or(0.0);
        let mut band_bottom: HashMap<usize, f32> = HashMap::new();
        let mut bottom = top;

        for (p, path) in self.branch.child_branches.iter().enumerate() {
            let mut prev_y = top;
            for (c, column) in path.columns.iter().enumerate() {
                let primary = column.primary();
                let level = self.connectivity.level(primary).unwrap_or(1);
                let owned = self.owns(primary, (self.index, p, c, 0));
                if owned {
                    let band = band_bottom.get(&level).map_or(top, |b| b + row_gap);
                    let y = top.max(prev_y).max(band) + nudge(primary);
                    scene.move_to(primary, Point::new(self.bands.x(level), y));
                }
                let Some(anchor) = scene.rect(primary) else {
                    continue;
                };
                prev_y = anchor.y;
                if owned {
                    record(&mut band_bottom, &mut bottom, level, &anchor);
                }

                let mut cursor = anchor.bottom();
                for (k, aux) in column.objects.iter().enumerate().skip(1) {
                    let owned = self.owns(aux, (self.index, p, c, k));
                    if owned {
                        let y = cursor + row_gap + nudge(aux);
                        scene.move_to(aux, Point::new(anchor.x, y));
                    }
                    let Some(rect) = scene.rect(aux) else {
                        continue;
                    };
                    cursor = rect.bottom();
                    if owned {
                        record(&mut band_bottom, &mut bottom, level, &rect);
                    }
                }
            }
        }
        bottom
    }

    /// First auxiliary object (in path/column order) crossed by an in-area
    /// edge, with the distance it must drop to clear the lowest crossing.
    fn first_crossing<G: GeometryProvider + ?Sized>(&self, scene: &Scene<'_, G>, area: Area) -> Option<(String, f32)> {
        let objects = scene.objects();
        // Objects of later branches still sit at their old positions.
        let placed = |id: &str| {
            objects
                .outermost(id)
                .and_then(|top| self.owners.get(top))
                .is_some_and(|slot| slot.0 <= self.index)
        };
        let segments: Vec<(String, String, (Point, Point))> = scene
            .store()
            .edges_between(area, area)
            .into_iter()
            .filter_map(|edge| {
                let source = objects.endpoint_owner(&edge.source)?.id.clone();
                let target = objects.endpoint_owner(&edge.target)?.id.clone();
                if !placed(source.as_str()) || !placed(target.as_str()) {
                    return None;
                }
                Some((source, target, scene.edge_segment(edge)?))
            })
            .collect();

        for (p, path) in self.branch.child_branches.iter().enumerate() {
            for (c, column) in path.columns.iter().enumerate() {
                for (k, aux) in column.objects.iter().enumerate().skip(1) {
                    if !self.owns(aux, (self.index, p, c, k)) {
                        continue;
                    }
                    let Some(rect) = scene.rect(aux) else {
                        continue;
                    };
                    let touches = |owner: &String| objects.is_ancestor_or_self(aux, owner);
                    let lowest = segments
                        .iter()
                        .filter(|(source, target, _)| !touches(source) && !touches(target))
                        .filter_map(|(_, _, (from, to))| lowest_crossing(*from, *to, &rect))
                        .max_by(|a, b| a.y.total_cmp(&b.y));
                    if let Some(cross) = lowest {
                        return Some((aux.clone(), (cross.y - rect.y) + self.config.crossing_offset));
                    }
                }
            }
        }
        None
    }
}

fn record(band_bottom: &mut HashMap<usize, f32>, bottom: &mut f32, level: usize, rect: &Rect) {
    let band = band_bottom.entry(level).or_insert(rect.bottom());
    *band = band.max(rect.bottom());
    *bottom = bottom.max(rect.bottom());
}

/// Stack lane objects top to bottom right of the widest branch, pushing each
/// candidate below any placed box it would overlap.
fn pack_lane<G: GeometryProvider + ?Sized>(
    scene: &mut Scene<'_, G>,
    connectivity: &Connectivity,
    branch_objects: &[String],
    config: &LayoutConfig,
) -> Vec<String> {
    let mut placed: Vec<Rect> = branch_objects.iter().filter_map(|id| scene.rect(id)).collect();
    let lane_x = placed
        .iter()
        .map(Rect::right)
        .reduce(f32::max)
        .map_or(config.column_gap, |right| right + config.lane_gap);

    let mut seen = HashSet::new();
    let mut lane = Vec::new();
    let mut cursor = config.top;
    for id in connectivity.lane() {
        if !seen.insert(id) || scene.position(id).is_none() {
            continue;
        }
        let size = scene.size(id);
        let mut candidate = Rect::new(Point::new(lane_x, cursor), size);
        // every push moves strictly below a distinct box
        for _ in 0..=placed.len() {
            let Some(hit) = placed
                .iter()
                .find(|rect| rect.overlaps(&candidate, config.overlap_tolerance))
            else {
                break;
            };
            candidate.y = hit.bottom() + config.row_gap;
        }
        scene.move_to(id, Point::new(candidate.x, candidate.y));
        cursor = candidate.bottom() + config.row_gap;
        placed.push(candidate);
        lane.push(id.to_string());
    }
    lane
}
