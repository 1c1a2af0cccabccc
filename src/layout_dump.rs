use crate::config::PortConfig;
use crate::geometry::GeometryProvider;
use crate::ir::{GraphStore, ObjectKind};
use crate::layout::{LayoutReport, edge_segment};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub areas: Vec<AreaDump>,
    pub edges: Vec<EdgeDump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<LayoutReport>,
}

#[derive(Debug, Serialize)]
pub struct AreaDump {
    pub area: String,
    pub objects: Vec<ObjectDump>,
}

#[derive(Debug, Serialize)]
pub struct ObjectDump {
    pub id: String,
    pub kind: String,
    pub parent: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    /// Empty when an endpoint does not resolve.
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_store<G: GeometryProvider + ?Sized>(
        store: &GraphStore,
        geometry: &G,
        ports: &PortConfig,
        report: Option<LayoutReport>,
    ) -> Self {
        let areas = crate::ir::Area::ALL
            .iter()
            .map(|&area| AreaDump {
                area: area.to_string(),
                objects: store
                    .area(area)
                    .objects()
                    .map(|object| {
                        let size = geometry.measure(&object.id).unwrap_or_default();
                        ObjectDump {
                            id: object.id.clone(),
                            kind: match object.kind {
                                ObjectKind::Vertex => "vertex".to_string(),
                                ObjectKind::Boundary => "boundary".to_string(),
                            },
                            parent: object.parent.clone(),
                            x: object.x,
                            y: object.y,
                            width: size.width,
                            height: size.height,
                        }
                    })
                    .collect(),
            })
            .collect();

        let edges = store
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                from: format!("{}:{}", edge.source.area, edge.source.vertex_id),
                to: format!("{}:{}", edge.target.area, edge.target.vertex_id),
                points: edge_segment(store, geometry, ports, edge)
                    .map(|(from, to)| vec![[from.x, from.y], [to.x, to.y]])
                    .unwrap_or_default(),
            })
            .collect();

        LayoutDump {
            areas,
            edges,
            report,
        }
    }
}

pub fn write_layout_dump(path: &Path, dump: &LayoutDump) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
