//! Tool infrastructure: catalog, dispatch, tool groups, health tracking.
//!
//! A tool call flows catalog (validate, coerce, default) -> group builder
//! (one `RequestDescriptor`) -> shared client -> group shaper -> `ToolResult`.

pub mod args;
pub mod catalog;
pub mod dispatcher;
pub mod groups;
pub mod health;
pub mod result;

pub use args::ToolArgs;
pub use catalog::{Constraint, ParamDef, ParamType, ToolCatalog, ToolEntry};
pub use dispatcher::{Dispatcher, ToolSpec};
pub use health::{HealthConfig, HealthStatus, ToolHealthTracker};
pub use result::{ToolError, ToolResult};
