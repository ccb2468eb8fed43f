use crate::models::{truncate_chars, Sanitize};
use serde::Serialize;

/// Metric data single measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    /// Namespace of the metric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ns: Option<String>,

    /// Name of the metric.
    pub name: String,

    /// Metric type. Single measurement or the aggregated value.
    #[serde(flatten)]
    pub kind: DataPointType,

    /// Single value for measurement. Sum of individual measurements for the aggregation.
    pub value: f64,
}

impl Sanitize for DataPoint {
    fn sanitize(&mut self) {
        truncate_chars(&mut self.name, 1024);
        if let Some(ns) = self.ns.as_mut() {
            truncate_chars(ns, 256);
        }
    }
}

/// Type of the metric data measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum DataPointType {
    /// A single measurement.
    Measurement,
    /// An aggregation of several measurements.
    Aggregation {
        /// Metric weight of the aggregated metric.
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<i32>,

        /// Minimum value of the aggregated metric.
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,

        /// Maximum value of the aggregated metric.
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,

        /// Standard deviation of the aggregated metric.
        #[serde(skip_serializing_if = "Option::is_none", rename = "stdDev")]
        std_dev: Option<f64>,
    },
}
