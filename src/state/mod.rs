//! Session lifecycle state and quiet-period inference.

mod quiet;
mod table;

pub use quiet::{QuietEvent, QuietKind};
pub use table::{StateSnapshot, StateTable, TrackingMode};
