// src/lib.rs
pub use admission::{AdmissionChain, AdmissionOptions, AdmissionPlugin, ClaimLabeler, ReservedLabels};
pub use claim_match::{ClaimMatch, match_reason, matches};
pub use enforcer::{ClaimEnforcer, ReadDenial};
pub use error::ClaimError;
pub use memory::{InMemoryAccessor, InMemoryGrants};
pub use options::VirtualOptions;
pub use router::{NamedVirtualWorkspace, PassthroughView, ViewRouter, VirtualWorkspaces, merge};
pub use timers::DecisionTimer;
pub use traits::{GrantSource, ResourceAccessor, ResourceView, WatchStream};
pub use types::*;
pub use watch::MatchTable;

pub mod admission;
mod claim_match;
mod enforcer;
mod error;
pub mod loader;
mod memory;
pub mod options;
mod router;
mod timers;
mod traits;
pub mod types;
mod watch;

#[cfg(feature = "observability")]
pub mod metrics;
