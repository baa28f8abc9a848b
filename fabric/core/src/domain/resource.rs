// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Events
//!
//! Typed change records streamed from the control plane and the handler
//! capability the shared informer dispatches them to.
//!
//! Handlers receive shared references and must not mutate them through
//! interior mutability. `on_update` may see `old == new` after a relist, and
//! `on_delete` may see a tombstone, so handlers must be idempotent.

use async_trait::async_trait;

/// Anything the informer can key by id.
pub trait Resource: Clone + Send + Sync + 'static {
    fn key(&self) -> &str;
}

impl Resource for crate::domain::agent::Agent {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Tombstone delivered when a deletion was inferred on relist and the final
/// state of the object is not known.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedFinalStateUnknown<T> {
    pub key: String,
    /// The last state the client saw before the stream was disrupted.
    pub last_known: T,
}

/// Payload of a delete notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletedObject<T> {
    Known(T),
    Unknown(DeletedFinalStateUnknown<T>),
}

impl<T: Resource> DeletedObject<T> {
    pub fn key(&self) -> &str {
        match self {
            DeletedObject::Known(obj) => obj.key(),
            DeletedObject::Unknown(tombstone) => &tombstone.key,
        }
    }

    /// Best known final state, whether observed or inferred.
    pub fn last_state(&self) -> &T {
        match self {
            DeletedObject::Known(obj) => obj,
            DeletedObject::Unknown(tombstone) => &tombstone.last_known,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, DeletedObject::Unknown(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent<T> {
    Added(T),
    Updated { old: T, new: T },
    Deleted(DeletedObject<T>),
}

impl<T: Resource> ResourceEvent<T> {
    pub fn key(&self) -> &str {
        match self {
            ResourceEvent::Added(obj) => obj.key(),
            ResourceEvent::Updated { new, .. } => new.key(),
            ResourceEvent::Deleted(obj) => obj.key(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceEvent::Added(_) => "add",
            ResourceEvent::Updated { .. } => "update",
            ResourceEvent::Deleted(_) => "delete",
        }
    }
}

/// Callbacks invoked by the shared informer on its dispatcher task.
///
/// A slow handler delays every other handler and every subsequent event;
/// long-running work belongs on a spawned task.
#[async_trait]
pub trait ResourceEventHandler<T: Resource>: Send + Sync {
    async fn on_add(&self, obj: &T) -> anyhow::Result<()>;

    async fn on_update(&self, old: &T, new: &T) -> anyhow::Result<()>;

    async fn on_delete(&self, obj: &DeletedObject<T>) -> anyhow::Result<()>;
}

type AddFn<T> = Box<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;
type UpdateFn<T> = Box<dyn Fn(&T, &T) -> anyhow::Result<()> + Send + Sync>;
type DeleteFn<T> = Box<dyn Fn(&DeletedObject<T>) -> anyhow::Result<()> + Send + Sync>;

/// Adapter turning optional closures into a [`ResourceEventHandler`].
/// Missing callbacks are no-ops.
pub struct ResourceEventHandlerFuncs<T> {
    add: Option<AddFn<T>>,
    update: Option<UpdateFn<T>>,
    delete: Option<DeleteFn<T>>,
}

impl<T> Default for ResourceEventHandlerFuncs<T> {
    fn default() -> Self {
        Self {
            add: None,
            update: None,
            delete: None,
        }
    }
}

impl<T: Resource> ResourceEventHandlerFuncs<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_add<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add = Some(Box::new(f));
        self
    }

    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.update = Some(Box::new(f));
        self
    }

    pub fn on_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&DeletedObject<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.delete = Some(Box::new(f));
        self
    }
}

#[async_trait]
impl<T: Resource> ResourceEventHandler<T> for ResourceEventHandlerFuncs<T> {
    async fn on_add(&self, obj: &T) -> anyhow::Result<()> {
        match &self.add {
            Some(f) => f(obj),
            None => Ok(()),
        }
    }

    async fn on_update(&self, old: &T, new: &T) -> anyhow::Result<()> {
        match &self.update {
            Some(f) => f(old, new),
            None => Ok(()),
        }
    }

    async fn on_delete(&self, obj: &DeletedObject<T>) -> anyhow::Result<()> {
        match &self.delete {
            Some(f) => f(obj),
            None => Ok(()),
        }
    }
}
