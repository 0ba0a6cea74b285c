//! Relationship materializer
//!
//! A pure reducer turning a stream of possibly duplicated, reordered or
//! partial store updates into a stable list. Each record id moves through
//! `NotMaterialized -> Active -> Removed` exactly once; `Removed` is
//! terminal, so a retired id can never come back. Recreating a relationship
//! therefore always means a fresh id.
//!
//! Records also name a *slot*, the store location they occupy. A slot holds
//! at most one active id: a new id arriving in an occupied slot retires the
//! previous one.

use super::types::{Contact, Group};
use std::collections::HashMap;

/// Something the materializer can hold
pub trait Materialize: Clone + PartialEq {
    /// Store location, e.g. the counterpart key of a contact
    fn slot(&self) -> &str;

    /// Record id, fresh for every incarnation of a relationship
    fn id(&self) -> &str;

    /// Merge a redelivered record into the materialized one. Override to
    /// keep fields that are maintained from other subscriptions.
    fn refresh(&mut self, incoming: Self) {
        *self = incoming;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialState {
    NotMaterialized,
    Active,
    Removed,
}

/// A decoded store update
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    /// Complete, non-disabled record
    Ready(T),
    /// Tombstone for `id`
    Disabled { id: String },
    /// Partial or malformed, try again on the next delivery
    NotReady,
}

/// Effect of one update on the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Inserted,
    /// A new id took over a slot; `removed` is the retired id
    Replaced { removed: String },
    Updated,
    Removed,
    Unchanged,
    Ignored,
}

impl Transition {
    /// Observers must be told
    pub fn changed(&self) -> bool {
        matches!(
            self,
            Transition::Inserted | Transition::Replaced { .. } | Transition::Updated | Transition::Removed
        )
    }

    /// A new id became active
    pub fn inserted(&self) -> bool {
        matches!(self, Transition::Inserted | Transition::Replaced { .. })
    }
}

/// Id-indexed state machine plus the list it produces
#[derive(Debug, Clone)]
pub struct Materializer<T> {
    states: HashMap<String, MaterialState>,
    slots: HashMap<String, String>,
    items: Vec<T>,
}

impl<T> Default for Materializer<T> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
            slots: HashMap::new(),
            items: Vec::new(),
        }
    }
}

impl<T: Materialize> Materializer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: &str) -> MaterialState {
        self.states
            .get(id)
            .copied()
            .unwrap_or(MaterialState::NotMaterialized)
    }

    /// Active entries in first-insertion order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Active entry occupying `slot`
    pub fn get(&self, slot: &str) -> Option<&T> {
        let id = self.slots.get(slot)?;
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Mutate the entry in `slot` in place; `f` reports whether it changed
    pub fn update(&mut self, slot: &str, f: impl FnOnce(&mut T) -> bool) -> bool {
        let Some(id) = self.slots.get(slot) else {
            return false;
        };
        match self.items.iter_mut().find(|item| item.id() == id) {
            Some(item) => f(item),
            None => false,
        }
    }

    /// Apply every update of one reduction step
    pub fn apply(&mut self, observation: Observation<T>) -> Transition {
        match observation {
            Observation::Ready(item) => self.ready(item),
            Observation::Disabled { id } => self.disable(&id),
            Observation::NotReady => Transition::Ignored,
        }
    }

    fn ready(&mut self, item: T) -> Transition {
        let id = item.id().to_string();
        match self.state(&id) {
            MaterialState::Removed => Transition::Ignored,
            MaterialState::Active => {
                let Some(current) = self.items.iter_mut().find(|existing| existing.id() == id) else {
                    return Transition::Ignored;
                };
                let before = current.clone();
                current.refresh(item);
                if *current == before {
                    Transition::Unchanged
                } else {
                    Transition::Updated
                }
            }
            MaterialState::NotMaterialized => {
                let slot = item.slot().to_string();
                let removed = self.slots.get(&slot).cloned();
                if let Some(old) = &removed {
                    self.retire(old);
                }

                self.states.insert(id.clone(), MaterialState::Active);
                self.slots.insert(slot, id);
                self.items.push(item);

                match removed {
                    Some(removed) => Transition::Replaced { removed },
                    None => Transition::Inserted,
                }
            }
        }
    }

    fn disable(&mut self, id: &str) -> Transition {
        match self.state(id) {
            MaterialState::Active => {
                self.retire(id);
                Transition::Removed
            }
            MaterialState::NotMaterialized => {
                // Never shown, but must never be shown later either
                self.states.insert(id.to_string(), MaterialState::Removed);
                Transition::Ignored
            }
            MaterialState::Removed => Transition::Ignored,
        }
    }

    fn retire(&mut self, id: &str) {
        self.states.insert(id.to_string(), MaterialState::Removed);
        self.items.retain(|item| item.id() != id);
        self.slots.retain(|_, active| active != id);
    }
}

impl Materialize for Contact {
    fn slot(&self) -> &str {
        self.identity.public_key.as_str()
    }

    fn id(&self) -> &str {
        &self.incarnation
    }

    fn refresh(&mut self, incoming: Self) {
        let unread_count = self.unread_count;
        *self = incoming;
        self.unread_count = unread_count;
    }
}

impl Materialize for Group {
    fn slot(&self) -> &str {
        self.id.as_str()
    }

    fn id(&self) -> &str {
        &self.membership
    }

    /// Roster, admins and unread count come from their own subscriptions
    fn refresh(&mut self, incoming: Self) {
        self.name = incoming.name;
    }
}
