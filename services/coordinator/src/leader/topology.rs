//! Job definition decoded from a code blob.

use serde::Deserialize;

/// The parts of a job definition the takeover check reads.
///
/// Everything else in the code blob is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobDefinition {
    #[serde(default)]
    pub dependency_jars: Option<Vec<String>>,

    #[serde(default)]
    pub dependency_artifacts: Option<Vec<String>>,
}

impl JobDefinition {
    pub fn decode(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }

    /// Dependency jar names followed by dependency artifact names.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependency_jars
            .iter()
            .flatten()
            .chain(self.dependency_artifacts.iter().flatten())
            .map(String::as_str)
    }
}
