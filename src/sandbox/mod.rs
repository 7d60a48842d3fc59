//! Restricted script execution with deterministic output capture.
//!
//! The executor runs one analysis script at a time inside a
//! capability-restricted namespace and harvests three things: everything
//! the script printed, a conventionally-named `result` binding, and any
//! figures left open by the chart helpers. Failures raised by the
//! untrusted script never cross the boundary — they are folded into the
//! returned envelope.

mod bindings;
mod config;
mod convert;
mod events;

pub use config::SandboxConfig;
pub use convert::{dynamic_to_json, json_to_dynamic};
pub use events::{EventCallback, SandboxCallbacks, SandboxEvent, verbose_callbacks};

use std::sync::{Arc, Mutex};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rhai::{EvalAltResult, Scope};
use serde::Serialize;

use crate::dashboard::RenderOptions;
use crate::frame::{Frame, FrameEnvelope};

/// Name of the scope binding harvested into the result envelope.
const RESULT_BINDING: &str = "result";

/// Everything one execution produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Captured print output; always present, possibly empty
    pub stdout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultValue>,
    /// Base64-encoded PNG payloads in figure-creation order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figures: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Serialized form of the `result` binding.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    /// A tabular frame, as a dataframe envelope
    Frame(FrameEnvelope),
    /// Any other value, as its textual representation
    Text(String),
}

/// Executes analysis scripts in a capability-restricted namespace.
///
/// A fresh engine and scope are built for every call; the only state
/// shared across invocations is the configuration and the helper
/// registration routine. Nothing a script binds, prints, or plots
/// survives into the next call.
pub struct SandboxExecutor {
    config: SandboxConfig,
    callbacks: SandboxCallbacks,
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxExecutor {
    pub fn new() -> Self {
        Self::with_config(SandboxConfig::default())
    }

    pub fn with_config(config: SandboxConfig) -> Self {
        Self {
            config,
            callbacks: SandboxCallbacks::default(),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    // =========================================================================
    // Builder methods for callbacks
    // =========================================================================

    /// Enable verbose logging to stderr.
    pub fn verbose(mut self, enabled: bool) -> Self {
        if enabled {
            self.callbacks = verbose_callbacks();
        }
        self
    }

    /// Set a callback for execution-start events.
    pub fn on_execution_started<F>(mut self, f: F) -> Self
    where
        F: Fn(&SandboxEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_execution_started = Some(Arc::new(f));
        self
    }

    /// Set a callback for captured print lines.
    pub fn on_print<F>(mut self, f: F) -> Self
    where
        F: Fn(&SandboxEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_print = Some(Arc::new(f));
        self
    }

    /// Set a callback for rendered figures.
    pub fn on_figure_rendered<F>(mut self, f: F) -> Self
    where
        F: Fn(&SandboxEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_figure_rendered = Some(Arc::new(f));
        self
    }

    /// Set a callback for execution-finished events.
    pub fn on_execution_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(&SandboxEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_execution_finished = Some(Arc::new(f));
        self
    }

    /// Set a catch-all callback for any event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&SandboxEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_event = Some(Arc::new(f));
        self
    }

    /// Enable event capture for later retrieval with `take_events`.
    pub fn capture_events(mut self, enabled: bool) -> Self {
        if enabled {
            self.callbacks.captured_events = Some(Arc::new(Mutex::new(Vec::new())));
        } else {
            self.callbacks.captured_events = None;
        }
        self
    }

    /// Take captured events.
    pub fn take_events(&mut self) -> Vec<SandboxEvent> {
        if let Some(events) = &self.callbacks.captured_events
            && let Ok(mut events) = events.lock()
        {
            return std::mem::take(&mut *events);
        }
        Vec::new()
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run one analysis script and harvest its effects.
    ///
    /// Never returns `Err` and never panics on script misbehavior: all
    /// faults — syntax errors, runtime errors, cancellation — are
    /// reported through the `error` field, with whatever stdout was
    /// captured before the fault. On a fault, partially recorded
    /// figures are discarded with the session.
    pub fn execute(&self, code: &str) -> ExecutionResult {
        self.callbacks.emit(&SandboxEvent::ExecutionStarted {
            code: code.to_string(),
        });

        let session = bindings::Session::new();
        let engine = bindings::build_engine(&self.config, &self.callbacks, &session);
        let mut scope = Scope::new();

        let outcome = engine.run_with_scope(&mut scope, code);

        let mut result = ExecutionResult {
            stdout: session.stdout(),
            result: None,
            figures: None,
            error: None,
        };

        match outcome {
            Ok(()) => {
                result.result = harvest_result(&scope);
                match self.render_figures(&session) {
                    Ok(figures) => {
                        if !figures.is_empty() {
                            result.figures = Some(figures);
                        }
                    }
                    Err((rendered, message)) => {
                        if !rendered.is_empty() {
                            result.figures = Some(rendered);
                        }
                        result.error = Some(message);
                    }
                }
            }
            Err(fault) => {
                result.error = Some(describe_failure(&fault));
            }
        }

        self.callbacks.emit(&SandboxEvent::ExecutionFinished {
            success: result.error.is_none(),
            stdout_bytes: result.stdout.len(),
        });
        result
    }

    /// Encode every open figure; on a rendering fault, report what was
    /// already encoded alongside the message.
    fn render_figures(
        &self,
        session: &bindings::Session,
    ) -> std::result::Result<Vec<String>, (Vec<String>, String)> {
        let options = RenderOptions {
            panel_width: self.config.panel_width,
            panel_height: self.config.panel_height,
        };
        let mut encoded = Vec::new();
        for (index, figure) in session.drain_figures().into_iter().enumerate() {
            match figure.render_png(&options) {
                Ok(png) => {
                    self.callbacks.emit(&SandboxEvent::FigureRendered {
                        index,
                        png_bytes: png.len(),
                    });
                    encoded.push(BASE64.encode(png));
                }
                Err(error) => {
                    return Err((
                        encoded,
                        format!("figure {} could not be rendered: {error}", index + 1),
                    ));
                }
            }
        }
        Ok(encoded)
    }
}

/// Serialize the `result` binding, if the script left one at top level.
fn harvest_result(scope: &Scope) -> Option<ResultValue> {
    let value = scope.get(RESULT_BINDING)?;
    if let Some(frame) = value.clone().try_cast::<Frame>() {
        return Some(ResultValue::Frame(frame.to_envelope()));
    }
    Some(ResultValue::Text(value.to_string()))
}

/// Format a script fault: kind, message, and best-effort location.
fn describe_failure(fault: &EvalAltResult) -> String {
    if let EvalAltResult::ErrorTerminated(token, _) = fault {
        return format!("execution cancelled: {token}");
    }
    fault.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use std::time::Duration;

    fn executor() -> SandboxExecutor {
        SandboxExecutor::new()
    }

    #[test]
    fn test_scalar_result_is_harvested() {
        let outcome = executor().execute("let result = 1 + 1;");
        assert_eq!(outcome.stdout, "");
        assert!(outcome.error.is_none());
        assert!(outcome.figures.is_none());
        match outcome.result {
            Some(ResultValue::Text(text)) => assert_eq!(text, "2"),
            other => panic!("expected textual result, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_result_binding_is_omitted() {
        let outcome = executor().execute("let x = 3;");
        assert!(outcome.result.is_none());
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_division_fault_is_captured() {
        let outcome = executor().execute("let x = 1 / 0;");
        assert_eq!(outcome.stdout, "");
        assert!(outcome.result.is_none());
        assert!(outcome.figures.is_none());
        let error = outcome.error.expect("division fault must be reported");
        assert!(error.to_lowercase().contains("zero"), "unexpected error: {error}");
    }

    #[test]
    fn test_stdout_before_fault_is_preserved() {
        let outcome = executor().execute("print(\"step one\");\nlet x = 1 / 0;");
        assert_eq!(outcome.stdout, "step one\n");
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_print_lines_are_captured_in_order() {
        let outcome = executor().execute("print(\"a\");\nprint(\"b\");");
        assert_eq!(outcome.stdout, "a\nb\n");
    }

    #[test]
    fn test_frame_result_becomes_dataframe_envelope() {
        let outcome = executor().execute(
            r#"
            let totals = frame(#{"region": ["emea", "apac"], "score": [4, 7]});
            let result = totals;
            "#,
        );
        assert!(outcome.error.is_none());
        match outcome.result {
            Some(ResultValue::Frame(envelope)) => {
                assert_eq!(envelope.kind, "dataframe");
                assert_eq!(
                    envelope.columns,
                    vec!["region".to_string(), "score".to_string()]
                );
                assert_eq!(envelope.records.len(), 2);
                assert_eq!(envelope.records[1]["score"], serde_json::json!(7));
            }
            other => panic!("expected dataframe envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_figures_are_captured_in_creation_order_and_do_not_leak() {
        let executor = executor();
        let outcome = executor.execute(
            r#"
            let totals = frame(#{"region": ["emea", "apac"], "score": [4, 7]});
            bar(totals, #{"x": "region", "y": "score"});
            line(totals, #{"y": "score"});
            "#,
        );
        assert!(outcome.error.is_none(), "error: {:?}", outcome.error);
        let figures = outcome.figures.expect("two figures expected");
        assert_eq!(figures.len(), 2);
        for figure in &figures {
            let png = base64::engine::general_purpose::STANDARD
                .decode(figure)
                .unwrap();
            assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
        }

        // A later unrelated execution sees a clean registry.
        let followup = executor.execute("let x = 1;");
        assert!(followup.figures.is_none());
        assert!(followup.error.is_none());
    }

    #[test]
    fn test_compose_dashboard_registers_one_figure() {
        let outcome = executor().execute(
            r#"
            let totals = frame(#{"region": ["emea", "apac"], "score": [4, 7]});
            let d = compose_dashboard([
                #{"type": "bar", "data": totals, "params": #{"x": "region", "y": "score"}},
                #{"type": "line", "data": totals, "params": #{"y": "score"}}
            ], #{"cols": 2, "title": "Overview"});
            let result = d.panels;
            "#,
        );
        assert!(outcome.error.is_none(), "error: {:?}", outcome.error);
        assert_eq!(outcome.figures.map(|figures| figures.len()), Some(1));
        match outcome.result {
            Some(ResultValue::Text(text)) => assert_eq!(text, "2"),
            other => panic!("expected panel count, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_compose_is_a_captured_fault() {
        let outcome = executor().execute("compose_dashboard([]);");
        let error = outcome.error.expect("empty compose must fail");
        assert!(error.contains("at least one chart"), "unexpected error: {error}");
    }

    #[test]
    fn test_unknown_chart_type_is_a_captured_fault() {
        let outcome = executor().execute(
            r#"
            let totals = frame(#{"score": [1, 2]});
            compose_dashboard([#{"type": "pie", "data": totals}]);
            "#,
        );
        let error = outcome.error.expect("unknown chart type must fail");
        assert!(error.contains("pie"), "unexpected error: {error}");
    }

    #[test]
    fn test_bindings_do_not_leak_between_calls() {
        let executor = executor();
        let first = executor.execute("let secret = 41;");
        assert!(first.error.is_none());
        let second = executor.execute("print(secret);");
        assert!(second.error.is_some(), "bindings must not persist");
    }

    #[test]
    fn test_import_is_unreachable() {
        let outcome = executor().execute("import \"fs\";");
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_runaway_script_is_cancelled() {
        let executor = SandboxExecutor::with_config(
            SandboxConfig::new()
                .timeout(Duration::from_millis(50))
                .max_operations(0),
        );
        let outcome = executor.execute("loop { }");
        let error = outcome.error.expect("runaway script must be cancelled");
        assert!(error.contains("cancelled"), "unexpected error: {error}");
    }

    #[test]
    fn test_operation_budget_bounds_execution() {
        let executor = SandboxExecutor::with_config(SandboxConfig::new().max_operations(100));
        let outcome = executor.execute("let n = 0; loop { n += 1; }");
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_numeric_helpers() {
        let outcome = executor().execute("let result = mean([1, 2, 3, 4]);");
        match outcome.result {
            Some(ResultValue::Text(text)) => assert_eq!(text, "2.5"),
            other => panic!("expected mean, got {other:?}"),
        }
        let outcome = executor().execute("let result = median([3, 1, 2, 10]);");
        match outcome.result {
            Some(ResultValue::Text(text)) => assert_eq!(text, "2.5"),
            other => panic!("expected median, got {other:?}"),
        }
    }

    #[test]
    fn test_events_are_captured() {
        let mut executor = executor().capture_events(true);
        executor.execute("print(\"hi\");");
        let events = executor.take_events();
        assert!(matches!(events[0], SandboxEvent::ExecutionStarted { .. }));
        assert!(events
            .iter()
            .any(|event| matches!(event, SandboxEvent::PrintCaptured { .. })));
        assert!(matches!(
            events.last(),
            Some(SandboxEvent::ExecutionFinished { success: true, .. })
        ));
    }
}
