//! Metadata-driven dashboard planning.
//!
//! The planner sketches a dashboard for an objective without executing
//! any code: it routes the question to a dataset, recommends tables,
//! partitions their columns, and proposes one chart per table that has
//! something to measure. Output is deterministic for a given catalog.

use std::sync::Arc;

use serde::Serialize;

use super::ChartKind;
use crate::catalog::{MetadataCatalog, TableDescriptor, normalize_identifier};

/// Maximum tables recommended when no focus list narrows the plan.
const MAX_RECOMMENDED_TABLES: usize = 4;

/// Inputs to one planning pass.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    objective: String,
    question: Option<String>,
    focus_tables: Vec<String>,
}

impl PlanRequest {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            question: None,
            focus_tables: Vec::new(),
        }
    }

    /// Route on this question instead of the objective.
    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    /// Restrict the plan to exactly these tables.
    pub fn focus_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.focus_tables = tables.into_iter().map(Into::into).collect();
        self
    }
}

/// A table the plan recommends, with its column partition.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TablePlan {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

/// One chart suggestion for a recommended table.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VisualizationSuggestion {
    pub table: String,
    pub chart_type: ChartKind,
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    pub description: String,
}

/// A non-executing dashboard sketch grounded in curated metadata.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardPlan {
    pub objective: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_dataset: Option<String>,
    pub routing_reason: String,
    pub recommended_tables: Vec<TablePlan>,
    pub visualizations: Vec<VisualizationSuggestion>,
}

/// Plans dashboards from catalog metadata alone.
pub struct DashboardPlanner {
    catalog: Arc<MetadataCatalog>,
}

impl DashboardPlanner {
    pub fn new(catalog: Arc<MetadataCatalog>) -> Self {
        Self { catalog }
    }

    pub fn plan(&self, request: &PlanRequest) -> DashboardPlan {
        let routing = self
            .catalog
            .route(request.question.as_deref().unwrap_or(&request.objective));

        let mut tables = Vec::new();
        if let Some(dataset_id) = &routing.dataset_id
            && let Some(dataset) = self.catalog.dataset(dataset_id)
        {
            let requested: Vec<String> = request
                .focus_tables
                .iter()
                .map(|name| normalize_identifier(name))
                .collect();
            for table in &dataset.tables {
                if !requested.is_empty() && !requested.contains(&table.id) {
                    continue;
                }
                tables.push(table_plan(table));
                if requested.is_empty() && tables.len() >= MAX_RECOMMENDED_TABLES {
                    break;
                }
            }
        }

        let visualizations = tables.iter().filter_map(suggestion_for).collect();
        DashboardPlan {
            objective: request.objective.clone(),
            question: request.question.clone(),
            recommended_dataset: routing.dataset_id.clone(),
            routing_reason: routing.reason,
            recommended_tables: tables,
            visualizations,
        }
    }
}

/// Partition a table's columns, preserving source order within each
/// side.
fn table_plan(table: &TableDescriptor) -> TablePlan {
    let mut numeric_columns = Vec::new();
    let mut categorical_columns = Vec::new();
    for column in &table.columns {
        if column.is_numeric() {
            numeric_columns.push(column.name.clone());
        } else {
            categorical_columns.push(column.name.clone());
        }
    }
    TablePlan {
        table: table.id.clone(),
        description: table.description.clone(),
        numeric_columns,
        categorical_columns,
    }
}

/// One suggestion per table with at least one numeric column: a bar
/// over the first categorical dimension when one exists, a KPI
/// indicator otherwise.
fn suggestion_for(table: &TablePlan) -> Option<VisualizationSuggestion> {
    let metric = table.numeric_columns.first()?.clone();
    let dimension = table.categorical_columns.first().cloned();
    let (chart_type, description) = match &dimension {
        Some(dimension) => (
            ChartKind::Bar,
            format!("Aggregate {metric} by {dimension}"),
        ),
        None => (
            ChartKind::Indicator,
            format!("Track {metric} over time or as a KPI"),
        ),
    };
    Some(VisualizationSuggestion {
        table: table.table.clone(),
        chart_type,
        metric,
        dimension,
        description,
    })
}
