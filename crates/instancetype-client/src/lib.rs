//! Instancetype object store client
//!
//! Typed access to the objects the instancetype controller reads and writes:
//! instance types and preferences (namespaced and cluster-wide), virtual
//! machines, `ControllerRevision`s and `ControllerRevisionUpgrade` requests.
//!
//! The [`InstancetypeClientTrait`] seam is implemented by
//! [`KubeInstancetypeClient`] against the API server, and by
//! `MockInstancetypeClient` (feature `test-util`) for unit tests.
//! Read-through caches are abstracted by [`ObjectCache`], implemented for
//! `kube_runtime` reflector stores.

pub mod cache;
pub mod client;
pub mod error;
pub mod patch;
#[path = "trait.rs"]
pub mod instancetype_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use cache::ObjectCache;
pub use client::KubeInstancetypeClient;
pub use error::ClientError;
pub use instancetype_trait::InstancetypeClientTrait;
pub use patch::PatchOperation;
#[cfg(feature = "test-util")]
pub use mock::{MockCache, MockInstancetypeClient, RecordedAction};
