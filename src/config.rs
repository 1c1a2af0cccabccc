use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed header/row heights used to place connection points on objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    pub header_height: f32,
    pub row_height: f32,
    pub group_header_height: f32,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            header_height: 28.0,
            row_height: 24.0,
            group_header_height: 30.0,
        }
    }
}

/// Declared sizes for headless runs (see `geometry::SizeTable::declared`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    pub vertex_width: f32,
    pub boundary_padding: f32,
    pub min_boundary_width: f32,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            vertex_width: 160.0,
            boundary_padding: 10.0,
            min_boundary_width: 180.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// y of the first branch.
    pub top: f32,
    /// Width of one level band before it is widened to the widest object.
    pub group_width: f32,
    /// Horizontal gap between level bands.
    pub column_gap: f32,
    /// Vertical gap between stacked objects.
    pub row_gap: f32,
    pub branch_gap: f32,
    /// Distance between the widest branch and the constant lane.
    pub lane_gap: f32,
    pub overlap_tolerance: f32,
    /// Extra drop applied below an edge crossing.
    pub crossing_offset: f32,
    pub max_crossing_repairs: usize,
    pub ports: PortConfig,
    pub sizing: SizingConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            top: 20.0,
            group_width: 200.0,
            column_gap: 60.0,
            row_gap: 20.0,
            branch_gap: 40.0,
            lane_gap: 60.0,
            overlap_tolerance: 2.0,
            crossing_offset: 15.0,
            max_crossing_repairs: 32,
            ports: PortConfig::default(),
            sizing: SizingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub max_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: crate::history::DEFAULT_MAX_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    history: Option<HistoryConfigFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    top: Option<f32>,
    group_width: Option<f32>,
    column_gap: Option<f32>,
    row_gap: Option<f32>,
    branch_gap: Option<f32>,
    lane_gap: Option<f32>,
    overlap_tolerance: Option<f32>,
    crossing_offset: Option<f32>,
    max_crossing_repairs: Option<usize>,
    header_height: Option<f32>,
    row_height: Option<f32>,
    group_header_height: Option<f32>,
    vertex_width: Option<f32>,
    boundary_padding: Option<f32>,
    min_boundary_width: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryConfigFile {
    max_size: Option<usize>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Overlay a JSON5 config document on the defaults. Every key is optional.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(file) = parsed.layout {
        let layout = &mut config.layout;
        if let Some(v) = file.top {
            layout.top = v;
        }
        if let Some(v) = file.group_width {
            layout.group_width = v;
        }
        if let Some(v) = file.column_gap {
            layout.column_gap = v;
        }
        if let Some(v) = file.row_gap {
            layout.row_gap = v;
        }
        if let Some(v) = file.branch_gap {
            layout.branch_gap = v;
        }
        if let Some(v) = file.lane_gap {
            layout.lane_gap = v;
        }
        if let Some(v) = file.overlap_tolerance {
            layout.overlap_tolerance = v.max(0.0);
        }
        if let Some(v) = file.crossing_offset {
            layout.crossing_offset = v;
        }
        if let Some(v) = file.max_crossing_repairs {
            layout.max_crossing_repairs = v;
        }
        if let Some(v) = file.header_height {
            layout.ports.header_height = v;
        }
        if let Some(v) = file.row_height {
            layout.ports.row_height = v;
        }
        if let Some(v) = file.group_header_height {
            layout.ports.group_header_height = v;
        }
        if let Some(v) = file.vertex_width {
            layout.sizing.vertex_width = v;
        }
        if let Some(v) = file.boundary_padding {
            layout.sizing.boundary_padding = v;
        }
        if let Some(v) = file.min_boundary_width {
            layout.sizing.min_boundary_width = v;
        }
    }

    if let Some(file) = parsed.history
        && let Some(v) = file.max_size
    {
        config.history.max_size = v;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.history.max_size, 100);
        assert_eq!(config.layout.row_gap, LayoutConfig::default().row_gap);
    }

    #[test]
    fn overlays_json5_values() {
        let config = parse_config(
            r#"{
                // tighter packing
                layout: { rowGap: 8, headerHeight: 20, vertexWidth: 120, },
                history: { maxSize: 5 },
            }"#,
        )
        .unwrap();
        assert_eq!(config.layout.row_gap, 8.0);
        assert_eq!(config.layout.ports.header_height, 20.0);
        assert_eq!(config.layout.sizing.vertex_width, 120.0);
        assert_eq!(config.layout.column_gap, LayoutConfig::default().column_gap);
        assert_eq!(config.history.max_size, 5);
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(parse_config("{ layout: ").is_err());
    }
}
