//! Flow layout preview
//!
//! Reads a flow's node list (JSON or YAML) and prints the computed canvas
//! layout, either as JSON or as a standalone SVG document.
//!
//! ## Usage
//!
//! ```bash
//! # JSON layout on stdout
//! flow-preview nodes.json
//!
//! # SVG preview with a custom config
//! flow-preview nodes.yaml --format svg --config journey.yaml -o flow.svg
//!
//! # Narrower canvas
//! flow-preview nodes.json --canvas-width 320
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use flowpath::{FlowLayout, FlowProgress, FlowSnapshot, LearningNode, NodeStatus};
use journey::JourneyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Svg,
}

#[derive(Parser, Debug)]
#[command(name = "flow-preview")]
#[command(about = "Render a learning flow's canvas layout")]
struct Args {
    /// Node list, JSON or YAML
    input: PathBuf,

    /// Path to journey config file
    #[arg(short, long, env = "JOURNEY_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the canvas width
    #[arg(long)]
    canvas_width: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Preview<'a> {
    progress: FlowProgress,
    layout: &'a FlowLayout,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => JourneyConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => JourneyConfig::default(),
    };
    if let Some(width) = args.canvas_width {
        config.layout.canvas_width = width;
    }

    let directive = config
        .general
        .log_directive("flow_preview")
        .parse::<Directive>()
        .with_context(|| format!("invalid log level {:?}", config.general.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let raw = std::fs::read_to_string(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let nodes = parse_nodes(&raw)?;
    let snapshot = FlowSnapshot::new(nodes)?;
    let layout = flowpath::layout(snapshot.nodes(), &config.layout);

    info!(
        nodes = snapshot.len(),
        connectors = layout.connectors.len(),
        height = layout.canvas_height(),
        "Layout computed"
    );

    let rendered = match args.format {
        Format::Json => serde_json::to_string_pretty(&Preview {
            progress: snapshot.summary(),
            layout: &layout,
        })?,
        Format::Svg => render_svg(&snapshot, &layout, config.layout.canvas_width),
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Preview written");
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn parse_nodes(raw: &str) -> anyhow::Result<Vec<LearningNode>> {
    match serde_json::from_str(raw) {
        Ok(nodes) => Ok(nodes),
        Err(json_err) => {
            debug!(error = %json_err, "Input is not JSON, trying YAML");
            serde_yaml::from_str(raw).context("input is neither a JSON nor a YAML node list")
        }
    }
}

fn status_fill(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Completed => "#58cc02",
        NodeStatus::Current => "#1cb0f6",
        NodeStatus::Available => "#ffc800",
        NodeStatus::Locked => "#e5e5e5",
    }
}

fn render_svg(snapshot: &FlowSnapshot, layout: &FlowLayout, width: f64) -> String {
    let height = layout.canvas_height();
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );

    for connector in &layout.connectors {
        let _ = writeln!(
            svg,
            r##"  <path d="{}" fill="none" stroke="#afafaf" stroke-width="4" stroke-linecap="round"/>"##,
            connector.path
        );
    }

    for node in &layout.positioned {
        let title = snapshot.node(&node.id).map(|n| n.title.as_str()).unwrap_or_default();
        let _ = writeln!(
            svg,
            r#"  <circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}"><title>{}</title></circle>"#,
            node.center.x,
            node.center.y,
            node.size / 2.0,
            status_fill(node.status),
            escape(title)
        );
        let _ = writeln!(
            svg,
            r#"  <text x="{:.1}" y="{:.1}" font-size="12" text-anchor="middle">{}</text>"#,
            node.center.x,
            node.center.y + node.size / 2.0 + 16.0,
            escape(title)
        );
    }

    svg.push_str("</svg>");
    svg
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
