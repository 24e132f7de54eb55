//! Actor references passed through to entry points
//!
//! The bridge never calls into the actor; it only hands the reference to the
//! resolved entry point, which downcasts it to the concrete actor type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identity of a distributed actor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorAddress(String);

impl ActorAddress {
    pub fn parse(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorAddress {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An actor that distributed targets can execute on
pub trait DistributedActor: Any + Send + Sync {
    fn id(&self) -> &ActorAddress;

    fn as_any(&self) -> &dyn Any;
}

/// Shared actor reference
pub type ActorRef = Arc<dyn DistributedActor>;

/// Plain actor with no state beyond its address
#[derive(Debug, Clone)]
pub struct LocalActor {
    id: ActorAddress,
}

impl LocalActor {
    pub fn new(id: ActorAddress) -> Self {
        Self { id }
    }

    /// Shared reference to a new local actor
    pub fn shared(address: &str) -> ActorRef {
        Arc::new(Self::new(ActorAddress::parse(address)))
    }
}

impl DistributedActor for LocalActor {
    fn id(&self) -> &ActorAddress {
        &self.id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
