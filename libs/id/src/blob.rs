//! Canonical blob keys derived from a job id.

use crate::JobId;

/// One of the three artifacts every running job owns in the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TopologyBlob {
    /// Executable package.
    Jar,
    /// Serialized job definition; dependency names are read from here.
    Code,
    /// Serialized job configuration.
    Conf,
}

impl TopologyBlob {
    /// All canonical blobs, in key order.
    pub const ALL: [TopologyBlob; 3] = [TopologyBlob::Jar, TopologyBlob::Code, TopologyBlob::Conf];

    /// Key suffix for this blob.
    pub const fn suffix(self) -> &'static str {
        match self {
            TopologyBlob::Jar => "-stormjar.jar",
            TopologyBlob::Code => "-stormcode.ser",
            TopologyBlob::Conf => "-stormconf.ser",
        }
    }

    /// Blob key for the given job.
    pub fn key_for(self, job: &JobId) -> String {
        format!("{}{}", job, self.suffix())
    }

    /// Classifies an arbitrary blob key by its suffix.
    ///
    /// Returns `None` for keys that follow no canonical convention, such as
    /// dependency blobs.
    pub fn classify(key: &str) -> Option<TopologyBlob> {
        Self::ALL.into_iter().find(|blob| key.ends_with(blob.suffix()))
    }

    /// Returns true if the key carries any canonical suffix.
    pub fn is_topology_key(key: &str) -> bool {
        Self::classify(key).is_some()
    }
}

/// The jar, code and conf keys for a job.
pub fn canonical_keys(job: &JobId) -> [String; 3] {
    TopologyBlob::ALL.map(|blob| blob.key_for(job))
}
