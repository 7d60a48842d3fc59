//! The helper surface pre-bound into every sandbox namespace.
//!
//! Everything reachable from analysis scripts is registered here: the
//! frame constructor and accessors, the numeric helpers, the chart
//! helpers, and the dashboard composer bridge. The engine carries no
//! other capabilities — `import` and `eval` are disabled at the symbol
//! level — so this registry plus the language primitives is the whole
//! capability table. No filesystem, network, or process access exists
//! behind any of these functions.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use rhai::{Array, Dynamic, Engine, EvalAltResult, Map};

use super::config::SandboxConfig;
use super::convert::{dynamic_to_json, json_to_dynamic};
use super::events::{SandboxCallbacks, SandboxEvent};
use crate::dashboard::{self, ChartData, ChartParams, ChartSpec, ComposeOptions, CompositeFigure};
use crate::error::Error;
use crate::frame::Frame;

/// Per-invocation shared state: the captured stdout buffer and the
/// open-figure registry. The whole session is dropped when the call
/// ends, so no figure or output state can leak into the next
/// invocation.
#[derive(Clone, Default)]
pub(super) struct Session {
    stdout: Arc<Mutex<String>>,
    figures: Arc<Mutex<Vec<CompositeFigure>>>,
}

impl Session {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn stdout(&self) -> String {
        self.stdout
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    /// Take every open figure, in creation order, leaving the registry
    /// empty.
    pub(super) fn drain_figures(&self) -> Vec<CompositeFigure> {
        self.figures
            .lock()
            .map(|mut figures| std::mem::take(&mut *figures))
            .unwrap_or_default()
    }

    fn append_line(&self, text: &str) {
        if let Ok(mut buffer) = self.stdout.lock() {
            buffer.push_str(text);
            buffer.push('\n');
        }
    }

    fn open_figure(&self, figure: CompositeFigure) {
        if let Ok(mut figures) = self.figures.lock() {
            figures.push(figure);
        }
    }
}

/// Build a fresh, sealed engine for one execution.
pub(super) fn build_engine(
    config: &SandboxConfig,
    callbacks: &SandboxCallbacks,
    session: &Session,
) -> Engine {
    let mut engine = Engine::new();

    // Seal the namespace: no module loading, no dynamic evaluation,
    // and hard resource ceilings for untrusted code.
    engine.disable_symbol("import");
    engine.disable_symbol("eval");
    engine.set_max_operations(config.max_operations);
    engine.set_max_call_levels(config.max_call_levels);
    engine.set_max_string_size(config.max_string_size);
    engine.set_max_array_size(config.max_array_size);
    engine.set_max_map_size(config.max_map_size);
    // Top-level bindings must survive verbatim for result harvesting.
    engine.set_optimization_level(rhai::OptimizationLevel::None);

    let deadline = Instant::now() + config.timeout;
    engine.on_progress(move |_| {
        if Instant::now() >= deadline {
            Some("wall-clock limit exceeded".into())
        } else {
            None
        }
    });

    {
        let session = session.clone();
        let callbacks = callbacks.clone();
        engine.on_print(move |text| {
            session.append_line(text);
            callbacks.emit(&SandboxEvent::PrintCaptured {
                text: text.to_string(),
            });
        });
    }
    {
        let session = session.clone();
        engine.on_debug(move |text, _source, pos| {
            session.append_line(&format!("[debug {pos}] {text}"));
        });
    }

    register_frame_api(&mut engine);
    register_numeric_api(&mut engine);
    register_chart_api(&mut engine, session);
    engine
}

fn register_frame_api(engine: &mut Engine) {
    engine.register_type_with_name::<Frame>("Frame");

    engine.register_fn("frame", |columns: Map| -> Result<Frame, Box<EvalAltResult>> {
        Ok(frame_from_map(&columns)?)
    });
    engine.register_fn(
        "frame",
        |records: Array| -> Result<Frame, Box<EvalAltResult>> {
            let json: Vec<serde_json::Value> = records.iter().map(dynamic_to_json).collect();
            Ok(Frame::from_records(&json)?)
        },
    );

    engine.register_get("columns", |frame: &mut Frame| -> Array {
        frame
            .columns()
            .iter()
            .map(|name| name.clone().into())
            .collect()
    });
    engine.register_get("rows", |frame: &mut Frame| frame.row_count() as i64);
    engine.register_fn(
        "column",
        |frame: &mut Frame, name: &str| -> Result<Array, Box<EvalAltResult>> {
            match frame.column(name) {
                Some(values) => Ok(values.iter().map(json_to_dynamic).collect()),
                None => Err(Error::InvalidChartData(format!("unknown column '{name}'")).into()),
            }
        },
    );
    engine.register_fn("head", |frame: &mut Frame, n: i64| frame.head(n.max(0) as usize));
    engine.register_fn("to_string", |frame: &mut Frame| frame.to_string());
    engine.register_fn("to_debug", |frame: &mut Frame| frame.to_string());
}

fn register_numeric_api(engine: &mut Engine) {
    engine.register_fn("sum", |values: Array| -> Result<f64, Box<EvalAltResult>> {
        Ok(numbers(&values, "sum")?.iter().sum())
    });
    engine.register_fn("mean", |values: Array| -> Result<f64, Box<EvalAltResult>> {
        let numbers = numbers(&values, "mean")?;
        if numbers.is_empty() {
            return Err(Error::InvalidChartData("mean() needs at least one value".to_string()).into());
        }
        Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
    });
    engine.register_fn("median", |values: Array| -> Result<f64, Box<EvalAltResult>> {
        let mut numbers = numbers(&values, "median")?;
        if numbers.is_empty() {
            return Err(
                Error::InvalidChartData("median() needs at least one value".to_string()).into(),
            );
        }
        numbers.sort_by(|a, b| a.total_cmp(b));
        let mid = numbers.len() / 2;
        if numbers.len() % 2 == 0 {
            Ok((numbers[mid - 1] + numbers[mid]) / 2.0)
        } else {
            Ok(numbers[mid])
        }
    });
    engine.register_fn("stdev", |values: Array| -> Result<f64, Box<EvalAltResult>> {
        let numbers = numbers(&values, "stdev")?;
        if numbers.len() < 2 {
            return Ok(0.0);
        }
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        let variance = numbers
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / (numbers.len() - 1) as f64;
        Ok(variance.sqrt())
    });
}

fn register_chart_api(engine: &mut Engine, session: &Session) {
    engine.register_type_with_name::<CompositeFigure>("Dashboard");
    engine.register_get("rows", |figure: &mut CompositeFigure| figure.rows as i64);
    engine.register_get("cols", |figure: &mut CompositeFigure| figure.cols as i64);
    engine.register_get("panels", |figure: &mut CompositeFigure| {
        figure.panels.len() as i64
    });

    for kind in ["bar", "line", "scatter", "indicator"] {
        let plain = session.clone();
        engine.register_fn(kind, move |data: Dynamic| -> Result<(), Box<EvalAltResult>> {
            open_single_chart(&plain, kind, data, &Map::new())
        });
        let with_params = session.clone();
        engine.register_fn(
            kind,
            move |data: Dynamic, params: Map| -> Result<(), Box<EvalAltResult>> {
                open_single_chart(&with_params, kind, data, &params)
            },
        );
    }

    let plain = session.clone();
    engine.register_fn(
        "compose_dashboard",
        move |charts: Array| -> Result<CompositeFigure, Box<EvalAltResult>> {
            compose_from_script(&plain, &charts, &Map::new())
        },
    );
    let with_options = session.clone();
    engine.register_fn(
        "compose_dashboard",
        move |charts: Array, options: Map| -> Result<CompositeFigure, Box<EvalAltResult>> {
            compose_from_script(&with_options, &charts, &options)
        },
    );
}

/// Validate one helper chart and register it as an open figure.
fn open_single_chart(
    session: &Session,
    kind: &str,
    data: Dynamic,
    params: &Map,
) -> Result<(), Box<EvalAltResult>> {
    let spec = ChartSpec {
        kind: kind.to_string(),
        data: coerce_chart_data(data),
        params: chart_params(params),
        row: None,
        col: None,
        title: string_entry(params, "title"),
    };
    let figure = dashboard::compose(std::slice::from_ref(&spec), &ComposeOptions::default())?;
    session.open_figure(figure);
    Ok(())
}

fn compose_from_script(
    session: &Session,
    charts: &Array,
    options: &Map,
) -> Result<CompositeFigure, Box<EvalAltResult>> {
    let mut specs = Vec::with_capacity(charts.len());
    for chart in charts {
        let Some(map) = chart.clone().try_cast::<Map>() else {
            return Err(Error::InvalidChartData(
                "each chart specification must be a map".to_string(),
            )
            .into());
        };
        specs.push(chart_spec_from_map(&map)?);
    }
    let options = compose_options_from_map(options);
    let figure = dashboard::compose(&specs, &options)?;
    session.open_figure(figure.clone());
    Ok(figure)
}

fn chart_spec_from_map(map: &Map) -> Result<ChartSpec, Box<EvalAltResult>> {
    let data = match map.get("data") {
        Some(value) => coerce_chart_data(value.clone()),
        None => {
            return Err(Error::Configuration(
                "each chart specification requires a 'data' value".to_string(),
            )
            .into());
        }
    };
    let params = map
        .get("params")
        .and_then(|value| value.clone().try_cast::<Map>())
        .map(|params| chart_params(&params))
        .unwrap_or_default();
    Ok(ChartSpec {
        kind: string_entry(map, "type").unwrap_or_else(|| "bar".to_string()),
        data,
        params,
        row: cell_entry(map, "row"),
        col: cell_entry(map, "col"),
        title: string_entry(map, "title"),
    })
}

fn compose_options_from_map(options: &Map) -> ComposeOptions {
    ComposeOptions {
        title: string_entry(options, "title"),
        rows: cell_entry(options, "rows").filter(|n| *n > 0),
        cols: cell_entry(options, "cols").filter(|n| *n > 0),
        shared_x: bool_entry(options, "shared_x"),
        shared_y: bool_entry(options, "shared_y"),
    }
}

/// Accept a `Frame` as-is; anything else goes through JSON and gets
/// coerced (or rejected) by the composer.
fn coerce_chart_data(data: Dynamic) -> ChartData {
    if let Some(frame) = data.clone().try_cast::<Frame>() {
        ChartData::Frame(frame)
    } else {
        ChartData::Value(dynamic_to_json(&data))
    }
}

fn chart_params(params: &Map) -> ChartParams {
    ChartParams {
        x: string_entry(params, "x"),
        y: string_entry(params, "y"),
    }
}

fn string_entry(map: &Map, key: &str) -> Option<String> {
    map.get(key).and_then(|value| value.clone().into_string().ok())
}

fn cell_entry(map: &Map, key: &str) -> Option<usize> {
    map.get(key)
        .and_then(|value| value.as_int().ok())
        .map(|index| index.max(0) as usize)
}

fn bool_entry(map: &Map, key: &str) -> bool {
    map.get(key)
        .and_then(|value| value.as_bool().ok())
        .unwrap_or(false)
}

/// Column-major constructor: every map entry is one column of values.
fn frame_from_map(columns: &Map) -> Result<Frame, Error> {
    let mut pairs: Vec<(String, Vec<serde_json::Value>)> = Vec::with_capacity(columns.len());
    for (name, values) in columns.iter() {
        let Some(array) = values.clone().try_cast::<Array>() else {
            return Err(Error::InvalidChartData(format!(
                "column '{name}' must be an array of values"
            )));
        };
        pairs.push((name.to_string(), array.iter().map(dynamic_to_json).collect()));
    }
    Frame::from_columns(pairs)
}

fn numbers(values: &Array, what: &str) -> Result<Vec<f64>, Error> {
    values
        .iter()
        .map(|value| {
            if let Ok(i) = value.as_int() {
                Ok(i as f64)
            } else if let Ok(f) = value.as_float() {
                Ok(f)
            } else {
                Err(Error::InvalidChartData(format!(
                    "{what}() expects numeric values, found {}",
                    value.type_name()
                )))
            }
        })
        .collect()
}
