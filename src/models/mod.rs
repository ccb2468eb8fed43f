pub mod context_tag_keys;
mod data;
mod data_point;
mod event_data;
mod exception_data;
mod exception_details;
mod message_data;
mod metric_data;
mod page_view_data;
mod remote_dependency_data;
mod sanitize;
mod severity_level;
mod telemetry_item;

pub use context_tag_keys::{ContextTagKey, Tags};
pub use data::*;
pub use data_point::*;
pub use event_data::*;
pub use exception_data::*;
pub use exception_details::*;
pub use message_data::*;
pub use metric_data::*;
pub use page_view_data::*;
pub use remote_dependency_data::*;
pub(crate) use sanitize::*;
pub use severity_level::*;
pub use telemetry_item::*;

use std::collections::BTreeMap;

/// Custom properties of a telemetry item.
pub type Properties = BTreeMap<String, String>;

/// Custom measurements of a telemetry item.
pub type Measurements = BTreeMap<String, f64>;
