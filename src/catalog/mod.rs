//! Curated dataset metadata: loading, lookups, routing, and summaries.
//!
//! The catalog grounds analysis in descriptor documents so the agent
//! host can answer schema questions without scanning live tables. It is
//! loaded eagerly, is immutable afterwards, and is shared by reference
//! (`Arc`) with every consumer; a process that needs fresh descriptors
//! loads a new catalog and re-injects it.

mod descriptor;

pub use descriptor::{ColumnDescriptor, DatasetDescriptor, TableDescriptor};

pub(crate) use descriptor::normalize_identifier;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Environment variable naming the descriptor directory for
/// [`MetadataCatalog::from_env`].
pub const METADATA_DIR_ENV: &str = "VIZIER_METADATA_DIR";

const DEFAULT_METADATA_DIR: &str = "metadata";

/// Dataset chosen when Microsoft 365 keywords match.
const M365_DATASET: &str = "ms_graph";
/// Dataset chosen when workforce keywords match.
const WORKFORCE_DATASET: &str = "gt_wf";

const M365_KEYWORDS: &[&str] = &[
    "m365",
    "microsoft 365",
    "office 365",
    "mailbox",
    "outlook",
    "exchange",
    "teams",
    "sharepoint",
    "intune",
    "azure ad",
    "entra",
    "graph",
    "license",
    "licence",
    "onedrive",
    "power platform",
];

const WORKFORCE_KEYWORDS: &[&str] = &[
    "workforce",
    "employment",
    "employee",
    "headcount",
    "attrition",
    "turnover",
    "hiring",
    "recruitment",
    "vacancy",
    "vacancies",
    "talent",
    "organisation",
    "organization",
    "people analytics",
    "hr",
    "human resources",
];

/// Structural gate for descriptor documents. Documents that fail it are
/// skipped at load, like documents that fail to parse.
static DESCRIPTOR_SCHEMA: Lazy<jsonschema::Validator> = Lazy::new(|| {
    let schema = serde_json::json!({
        "type": "object",
        "properties": {
            "dataset": {"type": "string"},
            "dataset_id": {"type": "string"},
            "description": {"type": "string"},
            "summary": {"type": "string"},
            "tables": {"type": ["object", "array"]}
        }
    });
    jsonschema::validator_for(&schema).expect("descriptor schema is well-formed")
});

/// The routing outcome: a dataset id when one of the keyword groups
/// matched, and always a human-readable reason.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoutingDecision {
    pub dataset_id: Option<String>,
    pub reason: String,
}

/// Immutable, eagerly-loaded index of dataset descriptors keyed by
/// normalized identifier.
#[derive(Debug, Default)]
pub struct MetadataCatalog {
    datasets: BTreeMap<String, DatasetDescriptor>,
}

impl MetadataCatalog {
    /// Load every `*.json` descriptor document under `dir`.
    ///
    /// Documents are visited in sorted path order. A document that
    /// cannot be read, parsed, or validated is skipped and never fails
    /// the rest of the load. A missing directory yields an empty
    /// catalog.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut datasets = BTreeMap::new();
        if !dir.exists() {
            return Ok(Self { datasets });
        }
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        for path in paths {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable descriptor");
                    continue;
                }
            };
            let document: Value = match serde_json::from_str(&raw) {
                Ok(document) => document,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unparseable descriptor");
                    continue;
                }
            };
            if !DESCRIPTOR_SCHEMA.is_valid(&document) {
                tracing::warn!(path = %path.display(), "skipping descriptor that fails schema validation");
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("dataset");
            let fallback = stem
                .strip_suffix("_metadata")
                .or_else(|| stem.strip_suffix("-metadata"))
                .unwrap_or(stem);
            let parsed = descriptor::from_document(&document, fallback);
            datasets.insert(parsed.id.clone(), parsed);
        }
        Ok(Self { datasets })
    }

    /// Load from the directory named by `VIZIER_METADATA_DIR`, falling
    /// back to `./metadata`.
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var(METADATA_DIR_ENV)
            .unwrap_or_else(|_| DEFAULT_METADATA_DIR.to_string());
        Self::load(dir)
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Datasets in identifier-sorted order.
    pub fn datasets(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.values()
    }

    /// Normalized dataset lookup. Absent means not found; never an
    /// error.
    pub fn dataset(&self, id: &str) -> Option<&DatasetDescriptor> {
        self.datasets.get(&normalize_identifier(id))
    }

    /// Normalized table lookup within a dataset.
    pub fn table(&self, dataset_id: &str, table_id: &str) -> Option<&TableDescriptor> {
        let dataset = self.dataset(dataset_id)?;
        let target = normalize_identifier(table_id);
        dataset.tables.iter().find(|table| table.id == target)
    }

    /// Like the lookups, but a miss here is a caller mistake and
    /// surfaces as an explicit error.
    pub fn fetch(
        &self,
        dataset_id: &str,
        table_id: Option<&str>,
    ) -> Result<(&DatasetDescriptor, Option<&TableDescriptor>)> {
        let dataset = self.dataset(dataset_id).ok_or_else(|| Error::DatasetNotFound {
            dataset: dataset_id.to_string(),
        })?;
        match table_id {
            None => Ok((dataset, None)),
            Some(table_id) => {
                let table = self.table(dataset.id.as_str(), table_id).ok_or_else(|| {
                    Error::TableNotFound {
                        dataset: dataset_id.to_string(),
                        table: table_id.to_string(),
                    }
                })?;
                Ok((dataset, Some(table)))
            }
        }
    }

    /// Route a free-text question to a dataset.
    ///
    /// Total: every question gets a decision with a reason. When both
    /// keyword groups match, Microsoft 365 context wins by default and
    /// the reason says so.
    pub fn route(&self, question: &str) -> RoutingDecision {
        let text = question.to_lowercase();
        let m365 = matched_keywords(&text, M365_KEYWORDS);
        let workforce = matched_keywords(&text, WORKFORCE_KEYWORDS);
        match (m365.is_empty(), workforce.is_empty()) {
            (false, true) => RoutingDecision {
                dataset_id: Some(M365_DATASET.to_string()),
                reason: format!("Matched Microsoft 365 keywords: {}.", m365.join(", ")),
            },
            (true, false) => RoutingDecision {
                dataset_id: Some(WORKFORCE_DATASET.to_string()),
                reason: format!("Matched workforce keywords: {}.", workforce.join(", ")),
            },
            (false, false) => RoutingDecision {
                dataset_id: Some(M365_DATASET.to_string()),
                reason: "Matched both keyword groups; prioritising Microsoft 365 context by default."
                    .to_string(),
            },
            (true, true) => RoutingDecision {
                dataset_id: None,
                reason: "No routing keywords detected; fall back to general reasoning.".to_string(),
            },
        }
    }

    /// Compact, prompt-ready summary: datasets in identifier order,
    /// tables in source order, at most the first 5 column names per
    /// table regardless of schema width.
    pub fn summarize(&self) -> String {
        if self.datasets.is_empty() {
            return "(No metadata descriptors were found; rely on exploratory analysis.)"
                .to_string();
        }
        let mut lines = Vec::new();
        for dataset in self.datasets.values() {
            let mut headline = format!("- Dataset `{}`", dataset.id);
            if let Some(description) = &dataset.description {
                headline.push_str(": ");
                headline.push_str(description);
            }
            lines.push(headline);
            for table in &dataset.tables {
                let mut detail = format!("    * {}:", table.id);
                if let Some(description) = &table.description {
                    detail.push_str(" ");
                    detail.push_str(description);
                }
                if let Some(rows) = table.row_count {
                    detail.push_str(&format!(" Rows: {rows}."));
                }
                let notable: Vec<&str> = table
                    .columns
                    .iter()
                    .take(5)
                    .map(|column| column.name.as_str())
                    .collect();
                if !notable.is_empty() {
                    detail.push_str(&format!(" Key fields: {}.", notable.join(", ")));
                }
                lines.push(detail);
            }
        }
        lines.join("\n")
    }
}

fn matched_keywords<'a>(text: &str, keywords: &'a [&'a str]) -> Vec<&'a str> {
    let mut found: Vec<&str> = keywords
        .iter()
        .copied()
        .filter(|keyword| text.contains(keyword))
        .collect();
    found.sort_unstable();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_descriptor(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    fn sample_catalog() -> (TempDir, MetadataCatalog) {
        let dir = TempDir::new().unwrap();
        write_descriptor(
            &dir,
            "ms_graph.json",
            r#"{
                "dataset": "Proj.MS_Graph",
                "description": "Microsoft 365 collaboration metadata",
                "tables": {
                    "Licenses": {
                        "description": "License assignments",
                        "row_count": 120,
                        "columns": {
                            "sku": {"type": "string"},
                            "count": {"type": "int64"},
                            "region": {"type": "string"},
                            "cost": {"type": "float64"},
                            "renewal": {"type": "date"},
                            "owner": {"type": "string"},
                            "notes": {"type": "string"}
                        }
                    }
                }
            }"#,
        );
        write_descriptor(
            &dir,
            "gt_wf_metadata.json",
            r#"{
                "tables": [
                    {
                        "table": "attrition",
                        "rows": 50,
                        "columns": [
                            {"name": "score", "type": "int64"},
                            {"name": "count", "type": "float64"},
                            {"name": "region", "type": "string"}
                        ]
                    }
                ]
            }"#,
        );
        let catalog = MetadataCatalog::load(dir.path()).unwrap();
        (dir, catalog)
    }

    #[test]
    fn test_lookup_round_trips_casing_and_qualification() {
        let (_dir, catalog) = sample_catalog();
        for id in ["ms_graph", "MS_GRAPH", "Proj.MS_Graph", "`other`.`MS_Graph`"] {
            let dataset = catalog.dataset(id).unwrap();
            assert_eq!(dataset.id, "ms_graph");
        }
    }

    #[test]
    fn test_table_lookup_is_normalized() {
        let (_dir, catalog) = sample_catalog();
        let table = catalog.table("MS_Graph", "Proj.LICENSES").unwrap();
        assert_eq!(table.id, "licenses");
        assert_eq!(table.row_count, Some(120));
        assert!(catalog.table("ms_graph", "missing").is_none());
        assert!(catalog.table("missing", "licenses").is_none());
    }

    #[test]
    fn test_dataset_id_falls_back_to_file_stem() {
        let (_dir, catalog) = sample_catalog();
        assert!(catalog.dataset("gt_wf").is_some());
    }

    #[test]
    fn test_broken_documents_are_skipped() {
        let dir = TempDir::new().unwrap();
        write_descriptor(&dir, "bad.json", "{ not json");
        write_descriptor(&dir, "wrong_shape.json", r#"{"tables": 3}"#);
        write_descriptor(&dir, "ok.json", r#"{"dataset": "good", "tables": []}"#);
        let catalog = MetadataCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.dataset("good").is_some());
    }

    #[test]
    fn test_missing_directory_yields_empty_catalog() {
        let catalog = MetadataCatalog::load("/definitely/not/a/real/path").unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.summarize().contains("No metadata descriptors"));
    }

    #[test]
    fn test_fetch_reports_explicit_misses() {
        let (_dir, catalog) = sample_catalog();
        assert!(catalog.fetch("ms_graph", Some("licenses")).is_ok());
        assert!(matches!(
            catalog.fetch("nope", None),
            Err(Error::DatasetNotFound { .. })
        ));
        assert!(matches!(
            catalog.fetch("ms_graph", Some("nope")),
            Err(Error::TableNotFound { .. })
        ));
    }

    #[test]
    fn test_route_m365_only() {
        let catalog = MetadataCatalog::default();
        let decision = catalog.route("teams outlook licensing question");
        assert_eq!(decision.dataset_id.as_deref(), Some("ms_graph"));
        assert!(decision.reason.contains("license"));
        assert!(decision.reason.contains("outlook"));
        assert!(decision.reason.contains("teams"));
    }

    #[test]
    fn test_route_workforce_only() {
        let catalog = MetadataCatalog::default();
        let decision = catalog.route("attrition and headcount trends");
        assert_eq!(decision.dataset_id.as_deref(), Some("gt_wf"));
        assert!(decision.reason.contains("attrition"));
        assert!(decision.reason.contains("headcount"));
    }

    #[test]
    fn test_route_both_prefers_m365() {
        let catalog = MetadataCatalog::default();
        let decision = catalog.route("teams attrition");
        assert_eq!(decision.dataset_id.as_deref(), Some("ms_graph"));
        assert!(decision.reason.contains("both keyword groups"));
    }

    #[test]
    fn test_route_neither_falls_back() {
        let catalog = MetadataCatalog::default();
        let decision = catalog.route("what is the weather");
        assert_eq!(decision.dataset_id, None);
        assert!(decision.reason.contains("general reasoning"));
    }

    #[test]
    fn test_summarize_is_bounded_and_ordered() {
        let (_dir, catalog) = sample_catalog();
        let summary = catalog.summarize();
        let gt_wf = summary.find("- Dataset `gt_wf`").unwrap();
        let ms_graph = summary.find("- Dataset `ms_graph`").unwrap();
        assert!(gt_wf < ms_graph, "datasets must appear in id order");
        assert!(summary.contains("Rows: 120."));
        // Only the first 5 of 7 license columns appear.
        assert!(summary.contains("sku, count, region, cost, renewal"));
        assert!(!summary.contains("notes"));
    }
}
