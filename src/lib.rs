//! Vizier - metadata-grounded sandboxed analysis engine
//!
//! Vizier is the analysis core for a conversational data-analyst host.
//! It loads curated dataset descriptors into an immutable catalog,
//! routes free-text questions to a dataset, sketches dashboard plans
//! from metadata alone, and executes untrusted analysis scripts inside
//! a capability-restricted sandbox that deterministically captures
//! stdout, a `result` binding, and rendered figures. Charts created
//! independently can be merged onto one grid with the dashboard
//! composer, from host code or from inside the sandbox.
//!
//! The SQL engine that produces tables, the agent loop that writes
//! scripts, and credential acquisition all live outside this crate.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vizier::{DashboardPlanner, MetadataCatalog, PlanRequest, SandboxExecutor};
//!
//! let catalog = Arc::new(MetadataCatalog::load("metadata")?);
//! println!("{}", catalog.summarize());
//!
//! let planner = DashboardPlanner::new(catalog.clone());
//! let plan = planner.plan(&PlanRequest::new("monthly licensing dashboard"));
//!
//! let executor = SandboxExecutor::new();
//! let outcome = executor.execute(r#"
//!     let totals = frame(#{"region": ["emea", "apac"], "licenses": [1200, 840]});
//!     bar(totals, #{"x": "region", "y": "licenses"});
//!     let result = totals;
//! "#);
//! assert!(outcome.error.is_none());
//! ```

mod catalog;
mod dashboard;
mod error;
mod frame;
mod sandbox;

pub use catalog::{
    ColumnDescriptor, DatasetDescriptor, METADATA_DIR_ENV, MetadataCatalog, RoutingDecision,
    TableDescriptor,
};
pub use dashboard::{
    AxisInfo, ChartData, ChartKind, ChartParams, ChartSpec, ComposeOptions, CompositeFigure,
    DashboardPlan, DashboardPlanner, Panel, PanelSeries, PlanRequest, RenderOptions, TablePlan,
    VisualizationSuggestion, compose,
};
pub use error::{Error, Result};
pub use frame::{Frame, FrameEnvelope};
pub use sandbox::{
    EventCallback, ExecutionResult, ResultValue, SandboxCallbacks, SandboxConfig, SandboxEvent,
    SandboxExecutor, dynamic_to_json, json_to_dynamic, verbose_callbacks,
};
