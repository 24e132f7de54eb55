//! Distributed target registry
//!
//! Maps target names to [`CallableRecord`]s. Records are registered when a
//! module is loaded and are immutable afterwards; lookups hand out shared
//! references and never mutate anything, so concurrent dispatches can
//! resolve targets without coordination beyond the registry's read lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::runtime::dispatch::abi::{DistributedAccessor, OpaqueRef};
use crate::runtime::errors::DispatchError;

/// Identifier of a target, as received from the remote side
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RemoteCallTarget {
    identifier: Arc<[u8]>,
}

impl RemoteCallTarget {
    pub fn new(identifier: impl AsRef<[u8]>) -> Self {
        Self {
            identifier: Arc::from(identifier.as_ref()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.identifier
    }

    /// Identifier for messages; invalid UTF-8 is replaced
    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.identifier).into_owned()
    }
}

impl fmt::Debug for RemoteCallTarget {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "RemoteCallTarget({:?})", self.display_name())
    }
}

impl fmt::Display for RemoteCallTarget {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Record flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFlags(u32);

impl RecordFlags {
    /// Target may be executed through the distributed bridge
    pub const DISTRIBUTED: RecordFlags = RecordFlags(1);

    pub const fn empty() -> Self {
        RecordFlags(0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(
        &self,
        other: RecordFlags,
    ) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_distributed(&self) -> bool {
        self.contains(Self::DISTRIBUTED)
    }
}

/// Generic environment of a target, opaque to this crate
#[derive(Clone)]
pub struct GenericEnvironment(OpaqueRef);

impl GenericEnvironment {
    pub fn new<T: std::any::Any + Send + Sync>(environment: T) -> Self {
        Self(Arc::new(environment))
    }

    pub fn downcast_ref<T: std::any::Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether both handles share one environment
    pub fn same_as(
        &self,
        other: &GenericEnvironment,
    ) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for GenericEnvironment {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str("GenericEnvironment(..)")
    }
}

/// One registered target
pub struct CallableRecord {
    name: Box<[u8]>,
    accessor: Arc<dyn DistributedAccessor>,
    generic_environment: Option<GenericEnvironment>,
    flags: RecordFlags,
}

impl CallableRecord {
    /// Create a distributed record
    pub fn new(
        name: impl AsRef<[u8]>,
        accessor: Arc<dyn DistributedAccessor>,
    ) -> Self {
        Self {
            name: name.as_ref().into(),
            accessor,
            generic_environment: None,
            flags: RecordFlags::DISTRIBUTED,
        }
    }

    pub fn with_generic_environment(
        mut self,
        environment: GenericEnvironment,
    ) -> Self {
        self.generic_environment = Some(environment);
        self
    }

    pub fn with_flags(
        mut self,
        flags: RecordFlags,
    ) -> Self {
        self.flags = flags;
        self
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn accessor(&self) -> &Arc<dyn DistributedAccessor> {
        &self.accessor
    }

    /// Frame size the entry point declares
    pub fn frame_size(&self) -> usize {
        self.accessor.frame_size()
    }

    pub fn generic_environment(&self) -> Option<&GenericEnvironment> {
        self.generic_environment.as_ref()
    }

    pub fn flags(&self) -> RecordFlags {
        self.flags
    }

    pub fn is_distributed(&self) -> bool {
        self.flags.is_distributed()
    }
}

impl fmt::Debug for CallableRecord {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CallableRecord")
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("frame_size", &self.frame_size())
            .field("generic_environment", &self.generic_environment.is_some())
            .field("flags", &self.flags)
            .finish()
    }
}

/// Read-only lookup of targets by name
pub trait CallableRegistry: Send + Sync {
    /// First record registered under exactly `name`
    fn lookup(
        &self,
        name: &[u8],
    ) -> Option<Arc<CallableRecord>>;
}

/// In-memory registry
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<Arc<CallableRecord>>,
    /// name -> index of the first record with that name
    index: HashMap<Box<[u8]>, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record
    ///
    /// Duplicate names are kept, but lookups keep returning the first one.
    pub fn register(
        &mut self,
        record: CallableRecord,
    ) {
        let position = self.records.len();
        if self.index.contains_key(record.name()) {
            warn!(
                name = %String::from_utf8_lossy(record.name()),
                "duplicate target registered; first registration wins"
            );
        } else {
            self.index.insert(record.name().into(), position);
        }
        self.records.push(Arc::new(record));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in registration order
    pub fn records(&self) -> impl Iterator<Item = &Arc<CallableRecord>> {
        self.records.iter()
    }
}

impl CallableRegistry for Registry {
    fn lookup(
        &self,
        name: &[u8],
    ) -> Option<Arc<CallableRecord>> {
        self.index
            .get(name)
            .map(|&position| Arc::clone(&self.records[position]))
    }
}

impl CallableRegistry for RwLock<Registry> {
    fn lookup(
        &self,
        name: &[u8],
    ) -> Option<Arc<CallableRecord>> {
        self.read().lookup(name)
    }
}

impl<R: CallableRegistry + ?Sized> CallableRegistry for Arc<R> {
    fn lookup(
        &self,
        name: &[u8],
    ) -> Option<Arc<CallableRecord>> {
        (**self).lookup(name)
    }
}

/// Process-wide registry, populated at load time
static GLOBAL_REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::new()));

/// Process-wide registry
pub fn global_registry() -> &'static RwLock<Registry> {
    &GLOBAL_REGISTRY
}

/// Resolve a target name to a distributed record
///
/// A record that is found but not flagged distributed means the registry
/// was built wrong; it is reported as `MalformedRecord` rather than used.
pub fn resolve(
    registry: &dyn CallableRegistry,
    name: &[u8],
) -> Result<Arc<CallableRecord>, DispatchError> {
    match registry.lookup(name) {
        Some(record) if record.is_distributed() => {
            debug!(
                name = %String::from_utf8_lossy(name),
                frame_size = record.frame_size(),
                "resolved distributed target"
            );
            Ok(record)
        }
        Some(_) => {
            let name = String::from_utf8_lossy(name).into_owned();
            error!(%name, "registered target is not flagged distributed");
            Err(DispatchError::MalformedRecord { name })
        }
        None => {
            let name = String::from_utf8_lossy(name).into_owned();
            warn!(%name, "no distributed target registered");
            Err(DispatchError::TargetNotFound { name })
        }
    }
}

/// Generic environment of the target named `name`, if it resolves
pub fn environment_for(
    registry: &dyn CallableRegistry,
    name: &[u8],
) -> Option<GenericEnvironment> {
    resolve(registry, name)
        .ok()
        .and_then(|record| record.generic_environment().cloned())
}
