use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validation errors for the wire model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("metric name is empty")]
    EmptyName,
    #[error("unknown metric kind: {0}")]
    BadKind(String),
    #[error("the gauge value is not set")]
    MissingValue,
    #[error("the counter delta is not set")]
    MissingDelta,
}

/// The two supported metric kinds.
///
/// A gauge is replaced on every update; a counter accumulates deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Counter => write!(f, "counter"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(ModelError::BadKind(other.to_string())),
        }
    }
}

/// A metric value, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(i64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Gauge(v) => write!(f, "{v}"),
            MetricValue::Counter(d) => write!(f, "{d}"),
        }
    }
}

/// A validated metric record: a non-empty name plus a value of one kind.
///
/// On the wire it is represented by [`MetricEnvelope`]; the custom codec
/// below keeps the optional `value`/`delta` fields omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetricEnvelope", into = "MetricEnvelope")]
pub struct Metric {
    pub id: String,
    pub value: MetricValue,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Gauge(value),
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Counter(delta),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// The wire envelope: `{id, type, value?, delta?}`.
///
/// `value` must be present iff `type` is `gauge`, `delta` iff `counter`;
/// the envelope itself does not enforce this so handlers can distinguish
/// a missing name from a missing value when mapping to status codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl MetricEnvelope {
    /// Validates the envelope into a strict [`Metric`].
    pub fn into_metric(self) -> Result<Metric, ModelError> {
        Metric::try_from(self)
    }
}

impl TryFrom<MetricEnvelope> for Metric {
    type Error = ModelError;

    fn try_from(envelope: MetricEnvelope) -> Result<Self, Self::Error> {
        if envelope.id.is_empty() {
            return Err(ModelError::EmptyName);
        }
        let value = match envelope.kind {
            MetricKind::Gauge => MetricValue::Gauge(envelope.value.ok_or(ModelError::MissingValue)?),
            MetricKind::Counter => {
                MetricValue::Counter(envelope.delta.ok_or(ModelError::MissingDelta)?)
            }
        };
        Ok(Metric {
            id: envelope.id,
            value,
        })
    }
}

impl From<Metric> for MetricEnvelope {
    fn from(metric: Metric) -> Self {
        let (value, delta) = match metric.value {
            MetricValue::Gauge(v) => (Some(v), None),
            MetricValue::Counter(d) => (None, Some(d)),
        };
        MetricEnvelope {
            id: metric.id,
            kind: metric.value.kind(),
            value,
            delta,
        }
    }
}
