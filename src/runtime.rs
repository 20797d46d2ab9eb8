//! The runtime collaborator interface.
//!
//! The bridge core is transport only; the meaning of each command belongs
//! to the debug runtime behind this trait. Dispatch calls arrive
//! synchronously, in wire order, from the connection's read loop.

use serde_json::Value;

/// Consumer of dispatched debuggee commands.
pub trait DebugRuntime {
    /// The debuggee stopped; `reason` is the stop command tag
    /// (e.g. `stopOnBreakpoint`, `stopOnStep`).
    fn stop(&mut self, stack: &Value, reason: &str);

    /// Show an informational tip to the user.
    fn show_tip(&mut self, msg: &str);

    /// Show an error message to the user.
    fn show_error(&mut self, msg: &str);

    /// Print a debuggee log line.
    fn print_log(&mut self, msg: &str);

    /// Refresh the memory usage display.
    fn refresh_memory(&mut self, info: &Value);
}
