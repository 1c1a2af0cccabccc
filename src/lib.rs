#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod editor;
pub mod geometry;
pub mod history;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, HistoryConfig, LayoutConfig, PortConfig, SizingConfig, load_config, parse_config};
pub use editor::Editor;
pub use geometry::{GeometryProvider, Point, Rect, Size, SizeTable};
pub use history::{
    ActionType, Collaborator, CollaboratorTable, History, HistoryElement, Snapshot, State, Target,
};
pub use ir::{Area, Document, DocumentError, Edge, Endpoint, GraphObject, GraphStore, ObjectKind};
pub use layout::{AutoLayout, Connectivity, LayoutReport, analyze_connectivity, compute_auto_layout, edge_segment};
pub use layout_dump::{LayoutDump, write_layout_dump};
