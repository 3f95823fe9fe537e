//! Flow layout engine.
//!
//! Places an ordered node list on a vertically scrolling canvas and routes a
//! connector between each consecutive pair. Layout is a pure function of the
//! input order and the config: the same input always yields the same output.
//!
//! # Columns
//!
//! Nodes cycle through a fixed 12-step column pattern, so the center column is
//! the only one ever adjacent to both sides:
//!
//! ```text
//!        L        C        R
//!  0              ●
//!  1              └────────●
//!  2              ●────────┘
//!  3     ●────────┘
//!  4     └────────●
//!  5              ...
//! ```
//!
//! # Routing
//!
//! Routes are looked up in [`ROUTES`], keyed by `(from, to)` column. Anchors are
//! taken from each node's *rendered* size, which shrinks with its status.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::types::{LearningNode, NodeId, NodeStatus, Point};

/// Repeating column assignment, indexed by `index % 12`.
pub const COLUMN_PATTERN: [Column; 12] = [
    Column::Center,
    Column::Right,
    Column::Center,
    Column::Left,
    Column::Center,
    Column::Right,
    Column::Center,
    Column::Left,
    Column::Center,
    Column::Right,
    Column::Center,
    Column::Left,
];

/// Route strategy per `(from, to)` column pair, indexed `[from.index()][to.index()]`.
pub const ROUTES: [[Route; 3]; 3] = [
    // from Left
    [Route::Fallback, Route::VerticalFirst, Route::Fallback],
    // from Center
    [Route::HorizontalFirst, Route::Straight, Route::HorizontalFirst],
    // from Right
    [Route::Fallback, Route::VerticalFirst, Route::Fallback],
];

/// Horizontal distance below which two nodes count as collinear.
const COLLINEAR_EPSILON: f64 = 0.5;

/// Canvas geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Canvas width in layout units
    pub canvas_width: f64,
    /// Center y of the first node
    pub start_y: f64,
    /// Vertical distance between consecutive node centers
    pub node_spacing: f64,
    /// Full-size node diameter (a `current` node)
    pub node_diameter: f64,
    /// Connector corner radius
    pub corner_radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            canvas_width: 375.0,
            start_y: 80.0,
            node_spacing: 140.0,
            node_diameter: 80.0,
            corner_radius: 8.0,
        }
    }
}

/// Horizontal lane a node sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Left,
    Center,
    Right,
}

impl Column {
    /// Fraction of canvas width at the column's center line.
    pub fn fraction(&self) -> f64 {
        match self {
            Self::Left => 0.2,
            Self::Center => 0.5,
            Self::Right => 0.8,
        }
    }

    /// Row/column index into [`ROUTES`].
    pub fn index(&self) -> usize {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }
}

/// Column for the node at `index` in flow order.
pub fn column_for_index(index: usize) -> Column {
    COLUMN_PATTERN[index % COLUMN_PATTERN.len()]
}

/// Rendered size of a node relative to the full diameter.
pub fn status_scale(status: NodeStatus) -> f64 {
    match status {
        NodeStatus::Current => 1.0,
        NodeStatus::Completed => 0.9,
        NodeStatus::Available => 0.85,
        NodeStatus::Locked => 0.8,
    }
}

/// Attachment point on a node's bounding circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

/// Anchor point of a node with the given center and rendered diameter.
pub fn anchor_point(center: Point, size: f64, anchor: Anchor) -> Point {
    let half = size / 2.0;
    match anchor {
        Anchor::Top => Point::new(center.x, center.y - half),
        Anchor::Bottom => Point::new(center.x, center.y + half),
        Anchor::Left => Point::new(center.x - half, center.y),
        Anchor::Right => Point::new(center.x + half, center.y),
        Anchor::Center => center,
    }
}

/// How a connector travels between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Bottom of `from` straight down to top of `to`
    Straight,
    /// Out of `from`'s side facing `to`, rounded turn, down into `to`'s top
    HorizontalFirst,
    /// Out of `from`'s bottom, rounded turn, into `to`'s side facing `from`
    VerticalFirst,
    /// Straight when collinear, otherwise horizontal-first toward `to`
    Fallback,
}

impl Route {
    /// Look up the route for a column pair.
    pub fn between(from: Column, to: Column) -> Self {
        ROUTES[from.index()][to.index()]
    }
}

/// A node with its computed canvas position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: NodeId,
    /// Position in the input list
    pub index: usize,
    pub column: Column,
    pub status: NodeStatus,
    /// Center of the node
    pub center: Point,
    /// Rendered diameter
    pub size: f64,
}

impl PositionedNode {
    pub fn anchor(&self, anchor: Anchor) -> Point {
        anchor_point(self.center, self.size, anchor)
    }
}

/// A routed path between two consecutive nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub from: NodeId,
    pub to: NodeId,
    pub start: Point,
    pub end: Point,
    /// SVG path data
    pub path: String,
}

/// Output of [`layout`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FlowLayout {
    pub positioned: Vec<PositionedNode>,
    pub connectors: Vec<Connector>,
    /// Scroll extent of the canvas
    pub height: f64,
}

impl FlowLayout {
    /// Connector path strings in flow order.
    pub fn connector_paths(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.path.as_str()).collect()
    }

    pub fn canvas_height(&self) -> f64 {
        self.height
    }

    pub fn position_of(&self, id: &str) -> Option<&PositionedNode> {
        self.positioned.iter().find(|p| p.id == id)
    }
}

/// Lay out `nodes` in the order given.
pub fn layout(nodes: &[LearningNode], config: &LayoutConfig) -> FlowLayout {
    let positioned: Vec<PositionedNode> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| position(index, node, config))
        .collect();

    let connectors = positioned
        .windows(2)
        .map(|pair| connect(&pair[0], &pair[1], config.corner_radius))
        .collect();

    let height = positioned
        .last()
        .map(|last| last.center.y + config.node_diameter / 2.0 + config.start_y)
        .unwrap_or(0.0);

    FlowLayout {
        positioned,
        connectors,
        height,
    }
}

fn position(index: usize, node: &LearningNode, config: &LayoutConfig) -> PositionedNode {
    let column = column_for_index(index);
    PositionedNode {
        id: node.id.clone(),
        index,
        column,
        status: node.status,
        center: Point::new(
            config.canvas_width * column.fraction(),
            config.start_y + index as f64 * config.node_spacing,
        ),
        size: config.node_diameter * status_scale(node.status),
    }
}

/// Route a connector from `from` to `to`.
pub fn connect(from: &PositionedNode, to: &PositionedNode, corner_radius: f64) -> Connector {
    let route = match Route::between(from.column, to.column) {
        Route::Fallback if (to.center.x - from.center.x).abs() < COLLINEAR_EPSILON => Route::Straight,
        Route::Fallback => Route::HorizontalFirst,
        route => route,
    };
    let toward_right = to.center.x >= from.center.x;

    let (start, end, path) = match route {
        Route::HorizontalFirst => {
            let start = from.anchor(if toward_right { Anchor::Right } else { Anchor::Left });
            let end = to.anchor(Anchor::Top);
            (start, end, horizontal_first(start, end, corner_radius))
        }
        Route::VerticalFirst => {
            let start = from.anchor(Anchor::Bottom);
            // Enter on the side facing `from`
            let end = to.anchor(if toward_right { Anchor::Left } else { Anchor::Right });
            (start, end, vertical_first(start, end, corner_radius))
        }
        Route::Straight | Route::Fallback => {
            let start = from.anchor(Anchor::Bottom);
            let end = to.anchor(Anchor::Top);
            let path = format!("M {} {} L {} {}", num(start.x), num(start.y), num(end.x), num(end.y));
            (start, end, path)
        }
    };

    Connector {
        from: from.id.clone(),
        to: to.id.clone(),
        start,
        end,
        path,
    }
}

fn horizontal_first(start: Point, end: Point, radius: f64) -> String {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let r = radius.min(dx.abs()).min(dy.abs()).max(0.0);
    let h = dx.signum();
    let v = if dy < 0.0 { -1.0 } else { 1.0 };
    format!(
        "M {} {} L {} {} Q {} {} {} {} L {} {}",
        num(start.x),
        num(start.y),
        num(end.x - h * r),
        num(start.y),
        num(end.x),
        num(start.y),
        num(end.x),
        num(start.y + v * r),
        num(end.x),
        num(end.y),
    )
}

fn vertical_first(start: Point, end: Point, radius: f64) -> String {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let r = radius.min(dx.abs()).min(dy.abs()).max(0.0);
    let h = dx.signum();
    let v = if dy < 0.0 { -1.0 } else { 1.0 };
    format!(
        "M {} {} L {} {} Q {} {} {} {} L {} {}",
        num(start.x),
        num(start.y),
        num(start.x),
        num(end.y - v * r),
        num(start.x),
        num(end.y),
        num(start.x + h * r),
        num(end.y),
        num(end.x),
        num(end.y),
    )
}

/// Two decimals at most, trailing zeros trimmed, no negative zero.
fn num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    let text = format!("{:.2}", rounded);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
