//! Observability for fieldgate
//!
//! Structured JSON logging of lifecycle and access events.
//!
//! ```ignore
//! use fieldgate::observability::{Event, Logger};
//!
//! Logger::info(Event::IndexCompiled, &[("schema", "users"), ("paths", "12")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};
