//! Managed resource kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of remote resource whose state is reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Anomaly detection job (opened / closed)
    Job,
    /// Datafeed feeding a job (started / stopped)
    Datafeed,
}

impl ResourceKind {
    /// All kinds, in a stable order
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Job, ResourceKind::Datafeed];

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Job => "job",
            ResourceKind::Datafeed => "datafeed",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown resource kind name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind '{0}' (expected job or datafeed)")]
pub struct ParseKindError(pub String);

impl FromStr for ResourceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" | "anomaly_detection_job" => Ok(ResourceKind::Job),
            "datafeed" => Ok(ResourceKind::Datafeed),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!("job".parse::<ResourceKind>(), Ok(ResourceKind::Job));
        assert_eq!(" Datafeed ".parse::<ResourceKind>(), Ok(ResourceKind::Datafeed));
        assert!("index".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&ResourceKind::Datafeed).unwrap();
        assert_eq!(json, "\"datafeed\"");
        let kind: ResourceKind = serde_json::from_str("\"job\"").unwrap();
        assert_eq!(kind, ResourceKind::Job);
    }
}
