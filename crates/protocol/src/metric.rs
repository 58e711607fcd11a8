use serde::{Deserialize, Serialize};

/// The kind of quantity a metric value represents.
///
/// Purely descriptive: it decides how a value is labelled and formatted for
/// humans and never changes how trees are merged or compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// A plain decimal number (sample counts, event counts).
    #[default]
    Number,
    /// A duration in nanoseconds, can be negative.
    Nanoseconds,
    /// A binary size in bytes.
    Bytes,
    /// A binary speed in bytes per second.
    BinarySpeed,
    /// Anything else, formatted verbatim.
    Other,
}

impl DataType {
    /// Format a value of this type for display.
    pub fn format(&self, value: i64) -> String {
        match self {
            Self::Number => format_decimal(value),
            Self::Nanoseconds => format_nanoseconds(value),
            Self::Bytes => format_bytes(value),
            Self::BinarySpeed => format!("{}/s", format_bytes(value)),
            Self::Other => value.to_string(),
        }
    }
}

fn format_decimal(value: i64) -> String {
    let abs = value.unsigned_abs() as f64;
    let sign = if value < 0 { "-" } else { "" };
    if abs >= 1_000_000_000.0 {
        format!("{sign}{:.1}G", abs / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{sign}{:.1}M", abs / 1_000_000.0)
    } else if abs >= 10_000.0 {
        format!("{sign}{:.1}k", abs / 1_000.0)
    } else {
        value.to_string()
    }
}

fn format_nanoseconds(value: i64) -> String {
    let abs = value.unsigned_abs() as f64;
    let sign = if value < 0 { "-" } else { "" };
    if abs >= 1_000_000_000.0 {
        format!("{sign}{:.2}s", abs / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{sign}{:.1}ms", abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{sign}{:.1}µs", abs / 1_000.0)
    } else {
        format!("{value}ns")
    }
}

fn format_bytes(value: i64) -> String {
    let abs = value.unsigned_abs() as f64;
    let sign = if value < 0 { "-" } else { "" };
    if abs >= 1_073_741_824.0 {
        format!("{sign}{:.1} GiB", abs / 1_073_741_824.0)
    } else if abs >= 1_048_576.0 {
        format!("{sign}{:.1} MiB", abs / 1_048_576.0)
    } else if abs >= 1_024.0 {
        format!("{sign}{:.1} KiB", abs / 1_024.0)
    } else {
        format!("{value} B")
    }
}

/// Associates a user-facing title with a data type for a tree metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricType {
    pub title: String,
    pub data_type: DataType,
    /// Whether per-node statistics are available for this metric.
    #[serde(default)]
    pub has_statistics: bool,
}

impl MetricType {
    pub fn new(title: impl Into<String>, data_type: DataType) -> Self {
        Self {
            title: title.into(),
            data_type,
            has_statistics: false,
        }
    }

    pub fn with_statistics(mut self) -> Self {
        self.has_statistics = true;
        self
    }

    /// The default metric for a tree's weight: a number titled "Weight".
    pub fn weight() -> Self {
        Self::new("Weight", DataType::Number)
    }

    pub fn format(&self, value: i64) -> String {
        self.data_type.format(value)
    }
}

impl Default for MetricType {
    fn default() -> Self {
        Self::weight()
    }
}

/// A value returned for one of a provider's additional metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
}

impl MetricValue {
    /// Format according to the metric's data type. Floats keep two decimals.
    pub fn format(&self, metric: &MetricType) -> String {
        match self {
            Self::Integer(v) => metric.format(*v),
            Self::Float(v) => format!("{v:.2}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_nanoseconds_by_magnitude() {
        assert_eq!(DataType::Nanoseconds.format(999), "999ns");
        assert_eq!(DataType::Nanoseconds.format(1_500), "1.5µs");
        assert_eq!(DataType::Nanoseconds.format(2_500_000), "2.5ms");
        assert_eq!(DataType::Nanoseconds.format(3_000_000_000), "3.00s");
        assert_eq!(DataType::Nanoseconds.format(-1_500), "-1.5µs");
    }

    #[test]
    fn formats_bytes_and_speed() {
        assert_eq!(DataType::Bytes.format(512), "512 B");
        assert_eq!(DataType::Bytes.format(2_048), "2.0 KiB");
        assert_eq!(DataType::Bytes.format(3 * 1_048_576), "3.0 MiB");
        assert_eq!(DataType::BinarySpeed.format(2_048), "2.0 KiB/s");
    }

    #[test]
    fn formats_numbers() {
        assert_eq!(DataType::Number.format(42), "42");
        assert_eq!(DataType::Number.format(12_345), "12.3k");
        assert_eq!(DataType::Number.format(-2_000_000), "-2.0M");
        assert_eq!(DataType::Other.format(12_345), "12345");
    }

    #[test]
    fn default_weight_metric() {
        let metric = MetricType::default();
        assert_eq!(metric.title, "Weight");
        assert_eq!(metric.data_type, DataType::Number);
        assert!(!metric.has_statistics);
    }

    #[test]
    fn metric_values() {
        let metric = MetricType::new("Self time", DataType::Nanoseconds);
        assert_eq!(MetricValue::Integer(1_500).format(&metric), "1.5µs");
        assert_eq!(MetricValue::Float(3.5).format(&metric), "3.50");
    }

    #[test]
    fn data_type_serializes_snake_case() {
        let json = serde_json::to_string(&DataType::BinarySpeed).unwrap_or_default();
        assert_eq!(json, "\"binary_speed\"");
    }
}
