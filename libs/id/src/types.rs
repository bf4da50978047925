//! Typed identifier definitions.
//!
//! Job ids are assigned at submission time and appear as children of the
//! coordination tree's active-jobs subtree. Node ids identify supervisors.

use crate::define_name;

define_name!(JobId, "job id");
define_name!(NodeId, "node id");

// =============================================================================
// Tests
// =============================================================================
