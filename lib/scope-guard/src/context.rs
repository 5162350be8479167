use std::{
    any::{Any, TypeId},
    sync::Arc,
};

use dashmap::DashMap;

/// Per-request, type-keyed storage.
///
/// The embedding application registers its access policy (and anything the
/// policy needs to find the current principal) before the request runs.
/// Stages may insert concurrently; values are shared read-only afterwards.
#[derive(Default)]
pub struct RequestContext {
    inner: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.inner.contains_key(&TypeId::of::<T>())
    }

    /// Stores `value`, returning the value it replaced, if any.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
        self.insert_arc(Arc::new(value))
    }

    pub fn insert_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Option<Arc<T>> {
        let value: Arc<dyn Any + Send + Sync> = value;
        self.inner
            .insert(TypeId::of::<T>(), value)
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let entry = self.inner.get(&TypeId::of::<T>())?;
        entry.value().clone().downcast::<T>().ok()
    }

    pub fn with<T: Any + Send + Sync>(self, value: T) -> Self {
        self.insert(value);
        self
    }
}
