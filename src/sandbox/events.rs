//! Executor events and callbacks for observability.

use std::sync::{Arc, Mutex};

/// Events emitted while a sandboxed script runs.
#[derive(Debug, Clone)]
pub enum SandboxEvent {
    /// A script is about to run
    ExecutionStarted { code: String },
    /// The script printed a line
    PrintCaptured { text: String },
    /// An open figure was rendered to PNG
    FigureRendered { index: usize, png_bytes: usize },
    /// The run finished
    ExecutionFinished { success: bool, stdout_bytes: usize },
}

/// Type alias for event callbacks
pub type EventCallback = Arc<dyn Fn(&SandboxEvent) + Send + Sync>;

/// Storage for executor callbacks
#[derive(Default, Clone)]
pub struct SandboxCallbacks {
    pub on_execution_started: Option<EventCallback>,
    pub on_print: Option<EventCallback>,
    pub on_figure_rendered: Option<EventCallback>,
    pub on_execution_finished: Option<EventCallback>,
    /// Catch-all callback for any event
    pub on_event: Option<EventCallback>,
    /// Captured events (used by tests and embedding hosts)
    pub(crate) captured_events: Option<Arc<Mutex<Vec<SandboxEvent>>>>,
}

impl SandboxCallbacks {
    /// Emit an event to the appropriate callback(s)
    pub fn emit(&self, event: &SandboxEvent) {
        if let Some(events) = &self.captured_events
            && let Ok(mut events) = events.lock()
        {
            events.push(event.clone());
        }

        let specific = match event {
            SandboxEvent::ExecutionStarted { .. } => &self.on_execution_started,
            SandboxEvent::PrintCaptured { .. } => &self.on_print,
            SandboxEvent::FigureRendered { .. } => &self.on_figure_rendered,
            SandboxEvent::ExecutionFinished { .. } => &self.on_execution_finished,
        };

        if let Some(cb) = specific {
            cb(event);
        }

        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }
}

/// Create verbose logging callbacks
pub fn verbose_callbacks() -> SandboxCallbacks {
    SandboxCallbacks {
        on_execution_started: Some(Arc::new(|e| {
            if let SandboxEvent::ExecutionStarted { code } = e {
                let lines: Vec<&str> = code.lines().take(3).collect();
                let preview = lines.join("\\n");
                let suffix = if code.lines().count() > 3 { "..." } else { "" };
                eprintln!("[vizier] Executing: {}{}", preview, suffix);
            }
        })),
        on_figure_rendered: Some(Arc::new(|e| {
            if let SandboxEvent::FigureRendered { index, png_bytes } = e {
                eprintln!("[vizier] Figure {}: {} bytes", index + 1, png_bytes);
            }
        })),
        on_execution_finished: Some(Arc::new(|e| {
            if let SandboxEvent::ExecutionFinished {
                success,
                stdout_bytes,
            } = e
            {
                let status = if *success { "✓" } else { "✗" };
                eprintln!("[vizier] {} finished ({} bytes of output)", status, stdout_bytes);
            }
        })),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_specific_and_catch_all() {
        let specific_hits = Arc::new(Mutex::new(0usize));
        let all_hits = Arc::new(Mutex::new(0usize));

        let specific = specific_hits.clone();
        let all = all_hits.clone();
        let callbacks = SandboxCallbacks {
            on_print: Some(Arc::new(move |_| {
                *specific.lock().unwrap() += 1;
            })),
            on_event: Some(Arc::new(move |_| {
                *all.lock().unwrap() += 1;
            })),
            ..Default::default()
        };

        callbacks.emit(&SandboxEvent::PrintCaptured {
            text: "hi".to_string(),
        });
        callbacks.emit(&SandboxEvent::ExecutionFinished {
            success: true,
            stdout_bytes: 3,
        });

        assert_eq!(*specific_hits.lock().unwrap(), 1);
        assert_eq!(*all_hits.lock().unwrap(), 2);
    }

    #[test]
    fn test_captured_events_store() {
        let store = Arc::new(Mutex::new(Vec::new()));
        let callbacks = SandboxCallbacks {
            captured_events: Some(store.clone()),
            ..Default::default()
        };
        callbacks.emit(&SandboxEvent::ExecutionStarted {
            code: "let x = 1;".to_string(),
        });
        assert_eq!(store.lock().unwrap().len(), 1);
    }
}
