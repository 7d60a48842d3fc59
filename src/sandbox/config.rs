//! Executor configuration.

use std::time::Duration;

/// Resource ceilings and rendering geometry for the sandbox.
///
/// Sandboxed code is untrusted: every run is bounded by a wall-clock
/// deadline, an operation budget, and allocation caps.
#[derive(Clone, Debug)]
pub struct SandboxConfig {
    /// Wall-clock ceiling for one execution
    pub timeout: Duration,
    /// Engine operation budget (0 disables the counter)
    pub max_operations: u64,
    /// Maximum script call-stack depth
    pub max_call_levels: usize,
    /// Longest string the script may build, in bytes
    pub max_string_size: usize,
    /// Largest array the script may build
    pub max_array_size: usize,
    /// Largest object map the script may build
    pub max_map_size: usize,
    /// Pixel width of one dashboard panel
    pub panel_width: u32,
    /// Pixel height of one dashboard panel
    pub panel_height: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_operations: 5_000_000,
            max_call_levels: 64,
            max_string_size: 1 << 20,
            max_array_size: 100_000,
            max_map_size: 10_000,
            panel_width: 640,
            panel_height: 400,
        }
    }
}

impl SandboxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wall-clock ceiling.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the operation budget. Zero disables the counter and leaves
    /// only the wall-clock ceiling.
    pub fn max_operations(mut self, n: u64) -> Self {
        self.max_operations = n;
        self
    }

    /// Set the maximum call-stack depth.
    pub fn max_call_levels(mut self, n: usize) -> Self {
        self.max_call_levels = n;
        self
    }

    /// Set the string allocation cap, in bytes.
    pub fn max_string_size(mut self, n: usize) -> Self {
        self.max_string_size = n;
        self
    }

    /// Set the array allocation cap.
    pub fn max_array_size(mut self, n: usize) -> Self {
        self.max_array_size = n;
        self
    }

    /// Set the object-map allocation cap.
    pub fn max_map_size(mut self, n: usize) -> Self {
        self.max_map_size = n;
        self
    }

    /// Set the pixel size of one dashboard panel.
    pub fn panel_size(mut self, width: u32, height: u32) -> Self {
        self.panel_width = width;
        self.panel_height = height;
        self
    }
}
