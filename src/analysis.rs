//! Content classifier boundary.
//!
//! The classifier itself is an external collaborator; the core only consumes
//! its verdict as an opaque annotation attached to a vault entry. Bucketing
//! thresholds (score to category/level) belong to the classifier, not here.

use serde::{Deserialize, Serialize};

/// Sensitivity category suggested by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Public,
    Private,
    Sensitive,
}

/// Risk level bucket suggested by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Moderate,
    High,
}

/// Classifier output consumed opaquely by the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierVerdict {
    /// 0-100 risk score.
    pub risk_score: u8,
    pub category: Category,
    pub risk_level: RiskLevel,
    /// Keywords detected in the content, in classifier order.
    pub keywords: Vec<String>,
}

/// Boundary trait implemented by the external content classifier.
pub trait Classifier: Send + Sync {
    /// Inspect file bytes and produce a verdict.
    fn analyze(&self, file_bytes: &[u8]) -> ClassifierVerdict;
}
