//! Chart specifications and dashboard composition.
//!
//! `compose` merges independently specified charts onto one grid. Each
//! chart is resolved in isolation — columns picked, series extracted,
//! axis labels and ranges fixed — and the resolved panel carries that
//! axis information onto its grid cell, so nothing is lost in the
//! merge. The composite renders to a single PNG image.

mod planner;
mod render;

pub use planner::{
    DashboardPlan, DashboardPlanner, PlanRequest, TablePlan, VisualizationSuggestion,
};
pub use render::RenderOptions;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::frame::{json_kind, Frame};

/// Chart kinds the renderer knows. The registry is closed: anything
/// else is rejected at compose time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Indicator,
}

impl ChartKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "bar" => Ok(Self::Bar),
            "line" => Ok(Self::Line),
            "scatter" => Ok(Self::Scatter),
            "indicator" => Ok(Self::Indicator),
            other => Err(Error::UnsupportedChartType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Scatter => "scatter",
            Self::Indicator => "indicator",
        }
    }
}

/// Data for one chart: an already-built frame, or a JSON value the
/// composer coerces (column-major object or record list).
#[derive(Debug, Clone)]
pub enum ChartData {
    Frame(Frame),
    Value(Value),
}

impl ChartData {
    fn to_frame(&self) -> Result<Frame> {
        match self {
            Self::Frame(frame) => Ok(frame.clone()),
            Self::Value(Value::Object(map)) => {
                let columns = map
                    .iter()
                    .map(|(name, values)| match values {
                        Value::Array(items) => Ok((name.clone(), items.clone())),
                        other => Err(Error::InvalidChartData(format!(
                            "column '{}' must be an array of values, found {}",
                            name,
                            json_kind(other)
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Frame::from_columns(columns)
            }
            Self::Value(Value::Array(records)) => Frame::from_records(records),
            Self::Value(other) => Err(Error::InvalidChartData(format!(
                "chart data must be a frame, a column map, or a record list, found {}",
                json_kind(other)
            ))),
        }
    }
}

/// Column-selection options for one chart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartParams {
    /// Dimension column; chart-kind-specific default when absent
    pub x: Option<String>,
    /// Metric column; defaults to the first numeric column
    pub y: Option<String>,
}

impl ChartParams {
    pub fn x(mut self, name: impl Into<String>) -> Self {
        self.x = Some(name.into());
        self
    }

    pub fn y(mut self, name: impl Into<String>) -> Self {
        self.y = Some(name.into());
        self
    }
}

/// One chart specification, independent of where it lands on the grid.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    /// Render-registry key (`bar`, `line`, `scatter`, `indicator`)
    pub kind: String,
    pub data: ChartData,
    pub params: ChartParams,
    /// Explicit 1-based grid placement; row-major fill when absent
    pub row: Option<usize>,
    pub col: Option<usize>,
    pub title: Option<String>,
}

impl ChartSpec {
    /// Chart over an existing frame.
    pub fn new(kind: impl Into<String>, frame: Frame) -> Self {
        Self {
            kind: kind.into(),
            data: ChartData::Frame(frame),
            params: ChartParams::default(),
            row: None,
            col: None,
            title: None,
        }
    }

    /// Chart over record-coercible data.
    pub fn from_value(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data: ChartData::Value(data),
            params: ChartParams::default(),
            row: None,
            col: None,
            title: None,
        }
    }

    pub fn with_params(mut self, params: ChartParams) -> Self {
        self.params = params;
        self
    }

    /// Pin the chart to an explicit grid cell (1-based).
    pub fn at(mut self, row: usize, col: usize) -> Self {
        self.row = Some(row);
        self.col = Some(col);
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Composition controls; `None` grid fields use the stacked default.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub title: Option<String>,
    pub rows: Option<usize>,
    pub cols: Option<usize>,
    pub shared_x: bool,
    pub shared_y: bool,
}

impl ComposeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn cols(mut self, cols: usize) -> Self {
        self.cols = Some(cols);
        self
    }

    pub fn shared_x(mut self, shared: bool) -> Self {
        self.shared_x = shared;
        self
    }

    pub fn shared_y(mut self, shared: bool) -> Self {
        self.shared_y = shared;
        self
    }
}

/// Axis information resolved from one chart and carried onto its cell.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisInfo {
    pub label: Option<String>,
    pub range: (f64, f64),
}

/// The marks a panel draws.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelSeries {
    Bars { labels: Vec<String>, values: Vec<f64> },
    Lines { points: Vec<(f64, f64)> },
    Points { points: Vec<(f64, f64)> },
    Indicator { value: f64 },
}

/// One resolved chart placed on the composite grid (1-based cell).
#[derive(Debug, Clone)]
pub struct Panel {
    pub row: usize,
    pub col: usize,
    pub title: Option<String>,
    pub kind: ChartKind,
    pub x_axis: AxisInfo,
    pub y_axis: AxisInfo,
    pub series: PanelSeries,
}

/// A multi-panel figure addressable by grid cell, renderable to one
/// PNG image.
#[derive(Debug, Clone)]
pub struct CompositeFigure {
    pub title: Option<String>,
    pub rows: usize,
    pub cols: usize,
    pub shared_x: bool,
    pub shared_y: bool,
    pub panels: Vec<Panel>,
}

impl CompositeFigure {
    /// Rasterize the grid to PNG bytes.
    pub fn render_png(&self, options: &RenderOptions) -> Result<Vec<u8>> {
        render::render_png(self, options)
    }

    /// The panel at a 1-based grid cell, if one was placed there.
    pub fn panel_at(&self, row: usize, col: usize) -> Option<&Panel> {
        self.panels
            .iter()
            .find(|panel| panel.row == row && panel.col == col)
    }
}

/// Merge independent chart specifications onto one grid.
///
/// The grid defaults to one stacked column (`rows = charts.len()`,
/// `cols = 1`). Explicit `row`/`col` placement on a spec wins; everything
/// else fills row-major. Per-chart titles are kept only if at least one
/// chart supplies one. Fails on an empty chart list, an unknown chart
/// kind, uncoercible data, or a placement outside the grid; no partial
/// figure is ever produced. Inputs are never mutated.
pub fn compose(charts: &[ChartSpec], options: &ComposeOptions) -> Result<CompositeFigure> {
    if charts.is_empty() {
        return Err(Error::Configuration(
            "at least one chart specification is required".to_string(),
        ));
    }
    let rows = options.rows.unwrap_or(charts.len());
    let cols = options.cols.unwrap_or(1);
    if rows == 0 || cols == 0 {
        return Err(Error::Configuration(
            "grid dimensions must be positive".to_string(),
        ));
    }
    let titled = charts.iter().any(|chart| chart.title.is_some());
    let mut panels = Vec::with_capacity(charts.len());
    for (index, chart) in charts.iter().enumerate() {
        let kind = ChartKind::parse(&chart.kind)?;
        let frame = chart.data.to_frame()?;
        let row = chart.row.unwrap_or(index / cols + 1);
        let col = chart.col.unwrap_or(index % cols + 1);
        if row == 0 || row > rows || col == 0 || col > cols {
            return Err(Error::Configuration(format!(
                "chart {} placed at ({row}, {col}) outside the {rows}x{cols} grid",
                index + 1
            )));
        }
        let mut panel = resolve_panel(kind, &frame, &chart.params)?;
        panel.row = row;
        panel.col = col;
        panel.title = if titled { chart.title.clone() } else { None };
        panels.push(panel);
    }
    Ok(CompositeFigure {
        title: options.title.clone(),
        rows,
        cols,
        shared_x: options.shared_x,
        shared_y: options.shared_y,
        panels,
    })
}

/// Render one chart in isolation: pick its columns, extract the series,
/// and fix the axis labels and ranges its composite cell inherits.
fn resolve_panel(kind: ChartKind, frame: &Frame, params: &ChartParams) -> Result<Panel> {
    let metric = match &params.y {
        Some(name) => name.clone(),
        None => frame
            .first_numeric_column()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidChartData(
                    "no numeric column available for the chart metric".to_string(),
                )
            })?,
    };
    let values = frame.numeric_values(&metric)?;

    match kind {
        ChartKind::Bar => {
            let dimension = params
                .x
                .clone()
                .or_else(|| frame.first_categorical_column().map(str::to_string));
            let labels = match &dimension {
                Some(name) => frame.labels(name)?,
                None => (1..=frame.row_count()).map(|i| i.to_string()).collect(),
            };
            let finite = values.iter().copied().filter(|v| v.is_finite());
            let y_min = finite.clone().fold(0.0_f64, f64::min);
            let y_max = finite.fold(0.0_f64, f64::max);
            Ok(Panel {
                row: 0,
                col: 0,
                title: None,
                kind,
                x_axis: AxisInfo {
                    label: dimension,
                    range: (0.0, labels.len() as f64),
                },
                y_axis: AxisInfo {
                    label: Some(metric),
                    range: (y_min, y_max),
                },
                series: PanelSeries::Bars { labels, values },
            })
        }
        ChartKind::Line | ChartKind::Scatter => {
            let (x_label, xs) = match &params.x {
                Some(name) => (Some(name.clone()), frame.numeric_values(name)?),
                None => (None, (0..frame.row_count()).map(|i| i as f64).collect()),
            };
            let points: Vec<(f64, f64)> = xs
                .iter()
                .zip(&values)
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .map(|(x, y)| (*x, *y))
                .collect();
            let x_range = bounds(points.iter().map(|point| point.0));
            let y_range = bounds(points.iter().map(|point| point.1));
            let series = if kind == ChartKind::Line {
                PanelSeries::Lines { points }
            } else {
                PanelSeries::Points { points }
            };
            Ok(Panel {
                row: 0,
                col: 0,
                title: None,
                kind,
                x_axis: AxisInfo {
                    label: x_label,
                    range: x_range,
                },
                y_axis: AxisInfo {
                    label: Some(metric),
                    range: y_range,
                },
                series,
            })
        }
        ChartKind::Indicator => {
            let value = values
                .iter()
                .rev()
                .copied()
                .find(|v| v.is_finite())
                .unwrap_or(0.0);
            Ok(Panel {
                row: 0,
                col: 0,
                title: None,
                kind,
                x_axis: AxisInfo {
                    label: None,
                    range: (0.0, 1.0),
                },
                y_axis: AxisInfo {
                    label: Some(metric),
                    range: (0.0, value.abs().max(1.0)),
                },
                series: PanelSeries::Indicator { value },
            })
        }
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        min = min.min(value);
        max = max.max(value);
    }
    if min > max { (0.0, 1.0) } else { (min, max) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales_frame() -> Frame {
        Frame::from_columns(vec![
            (
                "region".to_string(),
                vec![json!("emea"), json!("apac"), json!("amer")],
            ),
            ("score".to_string(), vec![json!(4), json!(7), json!(2)]),
        ])
        .unwrap()
    }

    fn bar_spec() -> ChartSpec {
        ChartSpec::new("bar", sales_frame())
    }

    #[test]
    fn test_compose_rejects_empty_chart_list() {
        let result = compose(&[], &ComposeOptions::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_compose_defaults_to_one_stacked_column() {
        let figure = compose(
            &[bar_spec(), bar_spec(), bar_spec()],
            &ComposeOptions::default(),
        )
        .unwrap();
        assert_eq!(figure.rows, 3);
        assert_eq!(figure.cols, 1);
        let placements: Vec<(usize, usize)> = figure
            .panels
            .iter()
            .map(|panel| (panel.row, panel.col))
            .collect();
        assert_eq!(placements, vec![(1, 1), (2, 1), (3, 1)]);
    }

    #[test]
    fn test_compose_fills_row_major() {
        // Only cols given: rows still defaults to the chart count.
        let figure = compose(
            &[bar_spec(), bar_spec(), bar_spec(), bar_spec()],
            &ComposeOptions::new().cols(2),
        )
        .unwrap();
        assert_eq!(figure.rows, 4);
        let placements: Vec<(usize, usize)> = figure
            .panels
            .iter()
            .map(|panel| (panel.row, panel.col))
            .collect();
        assert_eq!(placements, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
        assert!(figure.panel_at(2, 2).is_some());
    }

    #[test]
    fn test_explicit_placement_wins() {
        let charts = vec![bar_spec().at(2, 1), bar_spec()];
        let figure = compose(&charts, &ComposeOptions::new().rows(2).cols(1)).unwrap();
        assert_eq!((figure.panels[0].row, figure.panels[0].col), (2, 1));
        assert_eq!((figure.panels[1].row, figure.panels[1].col), (2, 1));
    }

    #[test]
    fn test_placement_outside_grid_is_rejected() {
        let charts = vec![bar_spec().at(3, 1)];
        let result = compose(&charts, &ComposeOptions::new().rows(2).cols(1));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unknown_chart_kind_is_named() {
        let charts = vec![ChartSpec::new("pie", sales_frame())];
        match compose(&charts, &ComposeOptions::default()) {
            Err(Error::UnsupportedChartType(kind)) => assert_eq!(kind, "pie"),
            other => panic!("expected UnsupportedChartType, got {other:?}"),
        }
    }

    #[test]
    fn test_uncoercible_data_is_rejected() {
        let charts = vec![ChartSpec::from_value("bar", json!("not a table"))];
        assert!(matches!(
            compose(&charts, &ComposeOptions::default()),
            Err(Error::InvalidChartData(_))
        ));
    }

    #[test]
    fn test_column_map_and_record_list_coerce() {
        let column_map = ChartSpec::from_value(
            "line",
            json!({"day": [1, 2, 3], "count": [10, 20, 15]}),
        )
        .with_params(ChartParams::default().x("day").y("count"));
        let records = ChartSpec::from_value(
            "scatter",
            json!([{"x": 1, "y": 2}, {"x": 3, "y": 4}]),
        )
        .with_params(ChartParams::default().x("x").y("y"));
        let figure = compose(&[column_map, records], &ComposeOptions::default()).unwrap();
        assert_eq!(figure.panels.len(), 2);
        assert_eq!(
            figure.panels[0].series,
            PanelSeries::Lines {
                points: vec![(1.0, 10.0), (2.0, 20.0), (3.0, 15.0)]
            }
        );
    }

    #[test]
    fn test_axis_information_is_copied_onto_panels() {
        let figure = compose(&[bar_spec()], &ComposeOptions::default()).unwrap();
        let panel = &figure.panels[0];
        assert_eq!(panel.x_axis.label.as_deref(), Some("region"));
        assert_eq!(panel.y_axis.label.as_deref(), Some("score"));
        assert_eq!(panel.y_axis.range, (0.0, 7.0));
        match &panel.series {
            PanelSeries::Bars { labels, values } => {
                assert_eq!(labels, &["emea", "apac", "amer"]);
                assert_eq!(values, &[4.0, 7.0, 2.0]);
            }
            other => panic!("expected bars, got {other:?}"),
        }
    }

    #[test]
    fn test_subplot_titles_only_when_any_chart_has_one() {
        let untitled = compose(&[bar_spec(), bar_spec()], &ComposeOptions::default()).unwrap();
        assert!(untitled.panels.iter().all(|panel| panel.title.is_none()));

        let titled = compose(
            &[bar_spec().titled("Scores"), bar_spec()],
            &ComposeOptions::new().titled("Overview"),
        )
        .unwrap();
        assert_eq!(titled.title.as_deref(), Some("Overview"));
        assert_eq!(titled.panels[0].title.as_deref(), Some("Scores"));
        assert_eq!(titled.panels[1].title, None);
    }

    #[test]
    fn test_indicator_uses_latest_value() {
        let spec = ChartSpec::new("indicator", sales_frame());
        let figure = compose(&[spec], &ComposeOptions::default()).unwrap();
        assert_eq!(
            figure.panels[0].series,
            PanelSeries::Indicator { value: 2.0 }
        );
    }

    #[test]
    fn test_chart_kind_parse() {
        assert_eq!(ChartKind::parse("bar").unwrap(), ChartKind::Bar);
        assert_eq!(ChartKind::parse("indicator").unwrap().as_str(), "indicator");
        assert!(matches!(
            ChartKind::parse("treemap"),
            Err(Error::UnsupportedChartType(_))
        ));
    }
}
