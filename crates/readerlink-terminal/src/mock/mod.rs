//! Mock terminal SDK for testing and development.
//!
//! The mock can be driven step by step from tests through its handle, or
//! built in simulated mode, where it answers every request on its own.

mod simulated;
pub mod terminal;

// Re-export commonly used types
pub use simulated::SimulatedTerminalConfig;
pub use terminal::{CallCounts, MockTerminal, MockTerminalHandle};
