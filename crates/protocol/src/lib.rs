pub mod metric;
pub mod shared_str;
pub mod style;
pub mod types;

pub use metric::{DataType, MetricType, MetricValue};
pub use shared_str::SharedStr;
pub use style::{OutputStyle, StyleKey, StyleMap};
pub use types::Color;
