//! Prometheus counters for the post engine, exposed on `/metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use domains::DomainError;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub operation: String,
    pub outcome: String,
}

pub struct Metrics {
    registry: Registry,
    operations: Family<OperationLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let operations = Family::<OperationLabels, Counter>::default();
        registry.register(
            "postline_operations",
            "Post engine operations by outcome",
            operations.clone(),
        );
        Self { registry, operations }
    }

    pub fn observe<T>(&self, operation: &str, result: &Result<T, DomainError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(DomainError::NotFound(..)) => "not_found",
            Err(DomainError::Validation(_)) => "invalid",
            Err(DomainError::Unauthorized(_)) => "unauthorized",
            Err(DomainError::ExternalService(_)) => "upstream_error",
            Err(DomainError::Internal(_)) => "error",
        };
        self.operations
            .get_or_create(&OperationLabels {
                operation: operation.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn count(&self, operation: &str, outcome: &str) -> u64 {
        self.operations
            .get_or_create(&OperationLabels {
                operation: operation.to_string(),
                outcome: outcome.to_string(),
            })
            .get()
    }

    /// OpenMetrics text exposition of every registered metric.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}
