//! Test utilities for stagehand views and sessions
//!
//! This module provides helpers for testing code built on stagehand:
//!
//! - [`RecordingSink`]: a [`PropertySink`] that records every flush
//! - [`FakeDomain`]: an in-memory [`Catalog`] + [`Rules`] + [`Roster`]
//! - Assertion macros for verifying flushed properties
//!
//! # Example
//!
//! ```
//! use stagehand_core::testing::RecordingSink;
//! use stagehand_core::{Binding, Property};
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq)]
//! enum Prop { Name }
//!
//! impl Property for Prop {
//!     fn name(&self) -> &'static str { "Name" }
//! }
//!
//! let sink = RecordingSink::new();
//! let mut binding = Binding::new(sink.clone());
//! binding.show();
//! binding.mark(&[Prop::Name]);
//! binding.flush();
//!
//! assert_eq!(sink.flushes(), vec![vec![Prop::Name]]);
//! ```

use crate::component::PropertySink;
use crate::domain::{
    AttributeId, Catalog, Conversion, EntityId, FactionId, ItemId, Roster, Rules, SlotId,
    StagedEquip, StagedTraining, SubItemId,
};
use crate::error::DomainError;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

struct Recording<P> {
    current: Vec<P>,
    flushes: Vec<Vec<P>>,
}

/// Records every flush delivered to it
///
/// Clones share the same recording, so one clone can be moved into a
/// [`Binding`](crate::Binding) while the test keeps the other.
pub struct RecordingSink<P> {
    inner: Rc<RefCell<Recording<P>>>,
}

impl<P> Clone for RecordingSink<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P> Default for RecordingSink<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: fmt::Debug> fmt::Debug for RecordingSink<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSink")
            .field("flushes", &self.inner.borrow().flushes)
            .finish()
    }
}

impl<P> RecordingSink<P> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Recording {
                current: Vec::new(),
                flushes: Vec::new(),
            })),
        }
    }

    /// Number of completed flushes
    pub fn flush_count(&self) -> usize {
        self.inner.borrow().flushes.len()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.current.clear();
        inner.flushes.clear();
    }
}

impl<P: Clone> RecordingSink<P> {
    /// Every completed flush, oldest first
    pub fn flushes(&self) -> Vec<Vec<P>> {
        self.inner.borrow().flushes.clone()
    }

    /// The most recent flush
    pub fn last_flush(&self) -> Option<Vec<P>> {
        self.inner.borrow().flushes.last().cloned()
    }

    /// Drain completed flushes
    pub fn take_flushes(&self) -> Vec<Vec<P>> {
        std::mem::take(&mut self.inner.borrow_mut().flushes)
    }
}

impl<P> PropertySink<P> for RecordingSink<P> {
    fn property_changed(&mut self, property: P) {
        self.inner.borrow_mut().current.push(property);
    }

    fn flush_complete(&mut self) {
        let mut inner = self.inner.borrow_mut();
        let batch = std::mem::take(&mut inner.current);
        inner.flushes.push(batch);
    }
}

/// Assert that the most recent flush contains exactly these properties
/// (in any order).
///
/// # Example
///
/// ```ignore
/// assert_flushed!(sink, [Prop::Name, Prop::Tier]);
/// ```
#[macro_export]
macro_rules! assert_flushed {
    ($sink:expr, [$($prop:expr),* $(,)?]) => {{
        let expected = vec![$($prop),*];
        let last = $sink.last_flush().unwrap_or_else(|| {
            panic!("Expected a flush of {:?}, but nothing was flushed", expected)
        });
        assert!(
            last.len() == expected.len() && expected.iter().all(|p| last.contains(p)),
            "Expected last flush to be {:?}, but got: {:?}",
            expected,
            last
        );
    }};
}

/// Assert that nothing was flushed.
///
/// # Example
///
/// ```ignore
/// assert_no_flush!(sink);
/// ```
#[macro_export]
macro_rules! assert_no_flush {
    ($sink:expr) => {
        assert!(
            $sink.flush_count() == 0,
            "Expected no flush, but got: {:?}",
            $sink.flushes()
        );
    };
}

/// Assert the number of completed flushes.
///
/// # Example
///
/// ```ignore
/// assert_flush_count!(sink, 1);
/// ```
#[macro_export]
macro_rules! assert_flush_count {
    ($sink:expr, $count:expr) => {
        assert_eq!(
            $sink.flush_count(),
            $count,
            "Unexpected flush count, flushes: {:?}",
            $sink.flushes()
        );
    };
}

type SlotKey = (EntityId, SubItemId, SlotId);

/// In-memory collaborator for tests
///
/// Costs are per target entity. Every entity without a capacity is
/// unlimited. Built with `with_*` methods and mutated with `set_*`
/// methods to simulate external changes.
///
/// ```
/// use stagehand_core::testing::FakeDomain;
/// use stagehand_core::{EntityId, Roster, Rules};
///
/// let domain = FakeDomain::new()
///     .with_count("militia", 12)
///     .with_capacity("guard", 5);
///
/// assert_eq!(domain.count_of(&EntityId::new("militia")), 12);
/// assert!(domain.is_capacity_limited(&EntityId::new("guard")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeDomain {
    default_faction: Option<FactionId>,
    factions: BTreeMap<FactionId, Vec<EntityId>>,
    sub_items: BTreeMap<EntityId, Vec<SubItemId>>,
    slots: Vec<SlotId>,
    slot_content: BTreeMap<SlotKey, ItemId>,
    staged_equip: BTreeMap<SlotKey, StagedEquip>,
    attributes: BTreeMap<EntityId, Vec<(AttributeId, i32)>>,
    staged_training: BTreeMap<(EntityId, AttributeId), StagedTraining>,
    conversion_sources: BTreeMap<EntityId, Vec<EntityId>>,
    capacities: BTreeMap<EntityId, u32>,
    costs: BTreeMap<EntityId, u64>,
    budget: u64,
    counts: BTreeMap<EntityId, u32>,
    illegal: BTreeSet<(EntityId, EntityId)>,
    failing: BTreeSet<(EntityId, EntityId)>,
    integrity_fixes: Vec<EntityId>,
}

fn ids<T: From<&'static str>>(names: &[&'static str]) -> Vec<T> {
    names.iter().map(|n| T::from(*n)).collect()
}

fn slot_key(entity: &str, sub_item: &str, slot: &str) -> SlotKey {
    (entity.into(), sub_item.into(), slot.into())
}

impl FakeDomain {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Catalog =====

    /// Add a faction; the first one added becomes the default
    pub fn with_faction(mut self, faction: &str, entities: &[&'static str]) -> Self {
        let faction = FactionId::new(faction);
        if self.default_faction.is_none() {
            self.default_faction = Some(faction.clone());
        }
        self.factions.insert(faction, ids(entities));
        self
    }

    pub fn with_default_faction(mut self, faction: &str) -> Self {
        self.default_faction = Some(faction.into());
        self
    }

    /// Sub-items of an entity; the first one is canonical
    pub fn with_sub_items(mut self, entity: &str, sub_items: &[&'static str]) -> Self {
        self.sub_items.insert(entity.into(), ids(sub_items));
        self
    }

    pub fn with_slots(mut self, slots: &[&'static str]) -> Self {
        self.slots = ids(slots);
        self
    }

    pub fn with_item(mut self, entity: &str, sub_item: &str, slot: &str, item: &str) -> Self {
        self.set_item(entity, sub_item, slot, Some(item));
        self
    }

    pub fn with_staged_equip(
        mut self,
        entity: &str,
        sub_item: &str,
        slot: &str,
        item: &str,
        remaining: u32,
    ) -> Self {
        self.set_staged_equip(entity, sub_item, slot, Some((item, remaining)));
        self
    }

    pub fn with_attribute(mut self, entity: &str, attribute: &str, value: i32) -> Self {
        self.attributes
            .entry(entity.into())
            .or_default()
            .push((attribute.into(), value));
        self
    }

    pub fn with_staged_training(
        mut self,
        entity: &str,
        attribute: &str,
        points: u32,
        remaining: u32,
    ) -> Self {
        self.staged_training.insert(
            (entity.into(), attribute.into()),
            StagedTraining { points, remaining },
        );
        self
    }

    pub fn with_conversion_sources(mut self, entity: &str, sources: &[&'static str]) -> Self {
        self.conversion_sources.insert(entity.into(), ids(sources));
        self
    }

    // ===== Rules =====

    pub fn with_capacity(mut self, entity: &str, capacity: u32) -> Self {
        self.capacities.insert(entity.into(), capacity);
        self
    }

    /// Per-unit cost of converting anything into `target`
    pub fn with_cost(mut self, target: &str, cost: u64) -> Self {
        self.costs.insert(target.into(), cost);
        self
    }

    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = budget;
        self
    }

    /// Declare `from → to` illegal
    pub fn illegal(mut self, from: &str, to: &str) -> Self {
        self.illegal.insert((from.into(), to.into()));
        self
    }

    /// Make applying `from → to` fail
    pub fn failing_on(mut self, from: &str, to: &str) -> Self {
        self.failing.insert((from.into(), to.into()));
        self
    }

    // ===== Roster =====

    pub fn with_count(mut self, entity: &str, count: u32) -> Self {
        self.set_count(entity, count);
        self
    }

    // ===== External changes =====

    pub fn set_count(&mut self, entity: &str, count: u32) {
        self.counts.insert(entity.into(), count);
    }

    pub fn set_budget(&mut self, budget: u64) {
        self.budget = budget;
    }

    pub fn set_item(&mut self, entity: &str, sub_item: &str, slot: &str, item: Option<&str>) {
        let key = slot_key(entity, sub_item, slot);
        match item {
            Some(item) => {
                self.slot_content.insert(key, item.into());
            }
            None => {
                self.slot_content.remove(&key);
            }
        }
    }

    pub fn set_staged_equip(
        &mut self,
        entity: &str,
        sub_item: &str,
        slot: &str,
        staged: Option<(&str, u32)>,
    ) {
        let key = slot_key(entity, sub_item, slot);
        match staged {
            Some((item, remaining)) => {
                self.staged_equip.insert(
                    key,
                    StagedEquip {
                        item: item.into(),
                        remaining,
                    },
                );
            }
            None => {
                self.staged_equip.remove(&key);
            }
        }
    }

    /// Delete a sub-item, as an external editor would
    pub fn remove_sub_item(&mut self, entity: &str, sub_item: &str) {
        if let Some(subs) = self.sub_items.get_mut(&EntityId::new(entity)) {
            subs.retain(|s| s.as_str() != sub_item);
        }
    }

    /// Entities passed to [`Rules::integrity_fix`], in call order
    pub fn integrity_fixes(&self) -> &[EntityId] {
        &self.integrity_fixes
    }

    /// Whether the entity is on the roster or listed under a faction
    fn knows(&self, entity: &EntityId) -> bool {
        self.counts.contains_key(entity) || self.factions.values().any(|es| es.contains(entity))
    }
}

impl Catalog for FakeDomain {
    fn default_faction(&self) -> Option<FactionId> {
        self.default_faction.clone()
    }

    fn entities(&self, faction: &FactionId) -> Vec<EntityId> {
        self.factions.get(faction).cloned().unwrap_or_default()
    }

    fn sub_items(&self, entity: &EntityId) -> Vec<SubItemId> {
        self.sub_items.get(entity).cloned().unwrap_or_default()
    }

    fn slots(&self) -> Vec<SlotId> {
        self.slots.clone()
    }

    fn slot_content(&self, entity: &EntityId, sub_item: &SubItemId, slot: &SlotId) -> Option<ItemId> {
        self.slot_content
            .get(&(entity.clone(), sub_item.clone(), slot.clone()))
            .cloned()
    }

    fn staged_equip(
        &self,
        entity: &EntityId,
        sub_item: &SubItemId,
        slot: &SlotId,
    ) -> Option<StagedEquip> {
        self.staged_equip
            .get(&(entity.clone(), sub_item.clone(), slot.clone()))
            .cloned()
    }

    fn attributes(&self, entity: &EntityId) -> Vec<(AttributeId, i32)> {
        self.attributes.get(entity).cloned().unwrap_or_default()
    }

    fn staged_training(&self, entity: &EntityId, attribute: &AttributeId) -> Option<StagedTraining> {
        self.staged_training
            .get(&(entity.clone(), attribute.clone()))
            .cloned()
    }

    fn conversion_sources(&self, entity: &EntityId) -> Vec<EntityId> {
        self.conversion_sources
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }
}

impl Rules for FakeDomain {
    fn is_capacity_limited(&self, entity: &EntityId) -> bool {
        self.capacities.contains_key(entity)
    }

    fn capacity(&self, entity: &EntityId) -> u32 {
        self.capacities.get(entity).copied().unwrap_or(u32::MAX)
    }

    fn cost_per_unit(&self, _from: &EntityId, to: &EntityId) -> u64 {
        self.costs.get(to).copied().unwrap_or(0)
    }

    fn budget(&self) -> u64 {
        self.budget
    }

    fn is_legal_mutation(&self, conversion: &Conversion) -> bool {
        !self
            .illegal
            .contains(&(conversion.from.clone(), conversion.to.clone()))
    }

    fn apply_mutation(&mut self, conversion: &Conversion) -> Result<(), DomainError> {
        let pair = (conversion.from.clone(), conversion.to.clone());
        if self.failing.contains(&pair) {
            return Err(DomainError::Rejected(format!("{conversion} refused")));
        }
        if !self.knows(&conversion.from) {
            return Err(DomainError::UnknownEntity(conversion.from.clone()));
        }

        let available = self.count_of(&conversion.from);
        if available < conversion.amount {
            return Err(DomainError::Rejected(format!(
                "only {available} of {} present",
                conversion.from
            )));
        }

        let cost = self.cost(conversion);
        if cost > self.budget {
            return Err(DomainError::InsufficientBudget {
                needed: cost,
                available: self.budget,
            });
        }

        self.budget -= cost;
        *self.counts.entry(pair.0).or_default() -= conversion.amount;
        *self.counts.entry(pair.1).or_default() += conversion.amount;
        Ok(())
    }

    fn integrity_fix(&mut self, entity: &EntityId) {
        self.integrity_fixes.push(entity.clone());
    }
}

impl Roster for FakeDomain {
    fn entries(&self) -> Vec<(EntityId, u32)> {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(entity, count)| (entity.clone(), *count))
            .collect()
    }

    fn count_of(&self, entity: &EntityId) -> u32 {
        self.counts.get(entity).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_batches() {
        let mut sink = RecordingSink::new();
        let observer = sink.clone();

        sink.property_changed("a");
        sink.property_changed("b");
        sink.flush_complete();
        sink.property_changed("c");
        sink.flush_complete();

        assert_eq!(observer.flushes(), vec![vec!["a", "b"], vec!["c"]]);
        assert_flush_count!(observer, 2);
        assert_flushed!(observer, ["c"]);

        assert_eq!(observer.take_flushes().len(), 2);
        assert_no_flush!(observer);
    }

    #[test]
    fn test_fake_domain_applies_mutations() {
        let mut domain = FakeDomain::new()
            .with_count("a", 5)
            .with_cost("b", 3)
            .with_budget(10);

        domain
            .apply_mutation(&Conversion::new("a".into(), "b".into(), 2))
            .unwrap();
        assert_eq!(domain.count_of(&"a".into()), 3);
        assert_eq!(domain.count_of(&"b".into()), 2);
        assert_eq!(domain.budget(), 4);

        let err = domain
            .apply_mutation(&Conversion::new("a".into(), "b".into(), 2))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientBudget {
                needed: 6,
                available: 4
            }
        );
    }

    #[test]
    fn test_fake_domain_rejects_unknown_origin() {
        let mut domain = FakeDomain::new().with_count("a", 5);

        let err = domain
            .apply_mutation(&Conversion::new("ghost".into(), "a".into(), 1))
            .unwrap_err();

        assert_eq!(err, DomainError::UnknownEntity(EntityId::new("ghost")));
        assert_eq!(domain.count_of(&"a".into()), 5);
    }

    #[test]
    fn test_fake_domain_catalog() {
        let mut domain = FakeDomain::new()
            .with_faction("clan", &["militia", "guard"])
            .with_sub_items("militia", &["battle", "civilian"])
            .with_item("militia", "battle", "head", "cap");

        assert_eq!(domain.default_faction(), Some(FactionId::new("clan")));
        assert_eq!(domain.entities(&"clan".into())[0], EntityId::new("militia"));
        assert_eq!(
            domain.slot_content(&"militia".into(), &"battle".into(), &"head".into()),
            Some(ItemId::new("cap"))
        );

        domain.remove_sub_item("militia", "battle");
        assert_eq!(domain.sub_items(&"militia".into()), vec![SubItemId::new("civilian")]);
    }
}
