//! Read-only object caches
//!
//! Caches are populated by watches running elsewhere; lookups here never
//! block on the network and always hand out owned copies.

use kube::Resource;
use kube_runtime::reflector::{ObjectRef, Store};
use std::fmt::Debug;
use std::hash::Hash;

/// Read access to locally cached objects.
pub trait ObjectCache<K>: Send + Sync {
    /// Returns a copy of the cached object, if any.
    ///
    /// `namespace` is `None` for cluster-scoped objects.
    fn get_cached(&self, namespace: Option<&str>, name: &str) -> Option<K>;
}

impl<K> ObjectCache<K> for Store<K>
where
    K: Resource + Clone + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    fn get_cached(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let mut key = ObjectRef::new(name);
        if let Some(namespace) = namespace {
            key = key.within(namespace);
        }
        self.get(&key).map(|object| object.as_ref().clone())
    }
}
