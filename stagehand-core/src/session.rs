//! Session context: current selection and derived caches
//!
//! [`SessionContext`] is the single source of truth for what is being
//! edited. Every selection change cascades to the levels below it,
//! recomputes the affected caches from the domain and fires the matching
//! channels inside one pulse, so each visible component flushes once per
//! logical operation.
//!
//! ```text
//! set_faction ─▶ set_entity ─┬▶ set_sub_item ─▶ update_slot_data
//!                            ├▶ update_attribute_data
//!                            ├▶ update_conversion_candidates
//!                            └▶ set_slot
//! ```
//!
//! Caches are only ever replaced wholesale by these calls; the only
//! incremental path is the single-slot delta capture in
//! [`SessionContext::update_slot_data`].

use crate::bus::Bus;
use crate::channel::Channel;
use crate::config::{StageStepConfig, StagehandConfig};
use crate::debug::{DebugSection, DebugState};
use crate::delta::{capture_equip_change, EquipChangeDelta};
use crate::domain::{
    AttributeId, Domain, EntityId, FactionId, ItemId, SlotId, StagedEquip, StagedTraining,
    SubItemId,
};
use crate::error::DomainError;
use crate::ledger::{ApplyReport, ConversionLedger, StepModifiers};
use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Cached state of one slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotData {
    /// Committed item
    pub content: Option<ItemId>,
    /// Staged replacement, if any
    pub staged: Option<StagedEquip>,
}

/// Cached state of one trainable attribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributeData {
    pub value: i32,
    pub staged: Option<StagedTraining>,
}

pub type SlotDataMap = BTreeMap<SlotId, SlotData>;
pub type AttributeDataMap = BTreeMap<AttributeId, AttributeData>;
/// Staged net amount per conversion candidate (positive: into the entity)
pub type ConversionCandidates = BTreeMap<EntityId, i64>;
pub type PopulationCounts = BTreeMap<EntityId, u32>;

/// Snapshot handed to every listener and handler during a fire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    faction: Option<FactionId>,
    entity: Option<EntityId>,
    sub_item: Option<SubItemId>,
    slot: Option<SlotId>,
    slot_data: SlotDataMap,
    attribute_data: AttributeDataMap,
    conversion_candidates: ConversionCandidates,
    population_counts: PopulationCounts,
    last_equip_change: Option<EquipChangeDelta>,
}

impl SessionState {
    pub fn faction(&self) -> Option<&FactionId> {
        self.faction.as_ref()
    }

    pub fn entity(&self) -> Option<&EntityId> {
        self.entity.as_ref()
    }

    pub fn sub_item(&self) -> Option<&SubItemId> {
        self.sub_item.as_ref()
    }

    pub fn slot(&self) -> Option<&SlotId> {
        self.slot.as_ref()
    }

    pub fn slot_data(&self) -> &SlotDataMap {
        &self.slot_data
    }

    /// Cached data of the selected slot
    pub fn selected_slot_data(&self) -> Option<&SlotData> {
        self.slot.as_ref().and_then(|s| self.slot_data.get(s))
    }

    pub fn attribute_data(&self) -> &AttributeDataMap {
        &self.attribute_data
    }

    pub fn conversion_candidates(&self) -> &ConversionCandidates {
        &self.conversion_candidates
    }

    pub fn population_counts(&self) -> &PopulationCounts {
        &self.population_counts
    }

    /// Delta captured by the last single-slot update
    pub fn last_equip_change(&self) -> Option<&EquipChangeDelta> {
        self.last_equip_change.as_ref()
    }

    /// Time units of training still pending across all attributes
    pub fn training_required(&self) -> u64 {
        self.attribute_data
            .values()
            .filter_map(|a| a.staged.as_ref())
            .map(|t| u64::from(t.remaining))
            .sum()
    }

    /// Pretty JSON dump for diagnostics
    pub fn debug_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn show<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_else(|| "-".into())
}

impl DebugState for SessionState {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let selection = DebugSection::new("Selection")
            .entry("faction", show(self.faction.as_ref()))
            .entry("entity", show(self.entity.as_ref()))
            .entry("sub_item", show(self.sub_item.as_ref()))
            .entry("slot", show(self.slot.as_ref()));

        let mut slots = DebugSection::new("Slots");
        for (slot, data) in &self.slot_data {
            let staged = data
                .staged
                .as_ref()
                .map(|s| format!(" -> {} ({})", s.item, s.remaining))
                .unwrap_or_default();
            slots.push_entry(slot.to_string(), format!("{}{staged}", show(data.content.as_ref())));
        }

        let mut caches = DebugSection::new("Caches")
            .entry("attributes", self.attribute_data.len().to_string())
            .entry("training_required", self.training_required().to_string())
            .entry("population_entries", self.population_counts.len().to_string());
        for (candidate, amount) in &self.conversion_candidates {
            caches.push_entry(format!("candidate {candidate}"), amount.to_string());
        }

        vec![selection, slots, caches]
    }
}

/// The active editing session
///
/// Owns the selection state, the domain collaborator, the conversion ledger
/// and the bus every view registers with.
///
/// # Example
///
/// ```
/// use stagehand_core::testing::FakeDomain;
/// use stagehand_core::{EntityId, SessionContext};
///
/// let domain = FakeDomain::new()
///     .with_faction("clan", &["militia"])
///     .with_sub_items("militia", &["battle"])
///     .with_slots(&["head"]);
///
/// let mut session = SessionContext::new(domain);
/// session.reset();
///
/// assert_eq!(session.state().entity(), Some(&EntityId::new("militia")));
/// assert_eq!(session.state().slot_data().len(), 1);
/// ```
#[derive(Debug)]
pub struct SessionContext<D> {
    state: SessionState,
    domain: D,
    ledger: ConversionLedger,
    bus: Rc<Bus<SessionState>>,
    stage_step: StageStepConfig,
}

impl<D: Domain> SessionContext<D> {
    /// Create a session with an empty selection and a default bus
    pub fn new(domain: D) -> Self {
        Self::with_bus(domain, Rc::new(Bus::new()))
    }

    /// Create a session whose bus is configured from `config`
    pub fn with_config(domain: D, config: &StagehandConfig) -> Self {
        let mut session = Self::with_bus(domain, Rc::new(Bus::with_config(config)));
        session.stage_step = config.stage_step;
        session
    }

    /// Create a session on an existing bus
    pub fn with_bus(domain: D, bus: Rc<Bus<SessionState>>) -> Self {
        Self {
            state: SessionState::default(),
            domain,
            ledger: ConversionLedger::new(),
            bus,
            stage_step: StageStepConfig::default(),
        }
    }

    pub fn bus(&self) -> &Rc<Bus<SessionState>> {
        &self.bus
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// Mutable access to the domain
    ///
    /// Changes made through it are not reflected in the caches until the
    /// matching `update_*` call.
    pub fn domain_mut(&mut self) -> &mut D {
        &mut self.domain
    }

    pub fn ledger(&self) -> &ConversionLedger {
        &self.ledger
    }

    fn fire(&self, channel: Channel) {
        self.bus.fire(channel, &self.state);
    }

    // ===== Selection =====

    /// Reset to the default faction and refresh population counts, as one pulse
    pub fn reset(&mut self) {
        let bus = Rc::clone(&self.bus);
        let _pulse = bus.pulse();
        debug!("Session reset");
        self.set_faction(None);
        self.update_population_counts(None);
    }

    /// Select a faction (or the domain's default) and cascade to its first entity
    pub fn set_faction(&mut self, faction: Option<FactionId>) {
        let bus = Rc::clone(&self.bus);
        let _pulse = bus.pulse();

        self.state.faction = faction.or_else(|| self.domain.default_faction());
        debug!(faction = %show(self.state.faction.as_ref()), "Faction selected");

        self.set_entity(None, false);
        self.fire(Channel::Faction);
    }

    /// Select an entity (or the faction's first one) and cascade to its defaults
    ///
    /// With `only_if_different`, selecting the current entity again does nothing.
    pub fn set_entity(&mut self, entity: Option<EntityId>, only_if_different: bool) {
        let entity = entity.or_else(|| {
            self.state
                .faction
                .as_ref()
                .and_then(|f| self.domain.entities(f).into_iter().next())
        });
        if only_if_different && self.state.entity.is_some() && self.state.entity == entity {
            return;
        }

        let bus = Rc::clone(&self.bus);
        let _pulse = bus.pulse();

        self.state.entity = entity;
        if let Some(entity) = &self.state.entity {
            self.domain.integrity_fix(entity);
        }
        debug!(entity = %show(self.state.entity.as_ref()), "Entity selected");

        self.set_sub_item(None);
        self.update_attribute_data(None);
        self.update_conversion_candidates(None);
        self.set_slot(None);

        self.fire(Channel::Entity);
    }

    /// Select a sub-item (or the canonical one) and rebuild slot data
    ///
    /// A sub-item that no longer belongs to the selected entity falls back to
    /// the canonical one.
    pub fn set_sub_item(&mut self, sub_item: Option<SubItemId>) {
        let owned = self
            .state
            .entity
            .as_ref()
            .map(|e| self.domain.sub_items(e))
            .unwrap_or_default();

        let chosen = match sub_item {
            Some(s) if owned.contains(&s) => Some(s),
            Some(s) => {
                warn!(sub_item = %s, "Sub-item does not belong to the selected entity, using canonical");
                owned.into_iter().next()
            }
            None => owned.into_iter().next(),
        };

        let bus = Rc::clone(&self.bus);
        let _pulse = bus.pulse();

        self.state.sub_item = chosen;
        self.update_slot_data(None, false);
        self.fire(Channel::SlotContent);
    }

    /// Select a slot (or the first one)
    ///
    /// Does nothing when the slot is already selected. Without a selected
    /// entity no slot can be selected, and a previous selection is cleared.
    pub fn set_slot(&mut self, slot: Option<SlotId>) {
        let slot = if self.state.entity.is_none() {
            if slot.is_some() {
                debug!("No entity selected, slot selection ignored");
            }
            None
        } else {
            slot.or_else(|| self.domain.slots().into_iter().next())
        };
        if self.state.slot == slot {
            return;
        }

        self.state.slot = slot;
        self.fire(Channel::Slot);
    }

    // ===== Caches =====

    /// Replace slot data (recomputed from the domain when `data` is `None`)
    ///
    /// A single-slot update captures the delta of the selected slot and fires
    /// [`Channel::SlotMutated`]; a full rebuild clears the last delta.
    /// [`Channel::Appearance`] fires either way.
    pub fn update_slot_data(&mut self, data: Option<SlotDataMap>, single_update: bool) {
        let next = data.unwrap_or_else(|| self.compute_slot_data());

        let bus = Rc::clone(&self.bus);
        let _pulse = bus.pulse();

        self.state.last_equip_change = match (&self.state.slot, single_update) {
            (Some(slot), true) => capture_equip_change(Some(&self.state.slot_data), &next, slot),
            _ => None,
        };
        self.state.slot_data = next;
        debug!(
            slots = self.state.slot_data.len(),
            single_update,
            delta = self.state.last_equip_change.is_some(),
            "Slot data updated"
        );

        if self.selected_is_capacity_limited() {
            self.update_conversion_candidates(None);
        }

        if single_update {
            self.fire(Channel::SlotMutated);
        }
        self.fire(Channel::Appearance);
    }

    /// Replace attribute data (recomputed from the domain when `None`)
    pub fn update_attribute_data(&mut self, data: Option<AttributeDataMap>) {
        self.state.attribute_data = data.unwrap_or_else(|| self.compute_attribute_data());
        debug!(attributes = self.state.attribute_data.len(), "Attribute data updated");
        self.fire(Channel::Training);
    }

    /// Replace conversion candidates (derived from the ledger when `None`)
    pub fn update_conversion_candidates(&mut self, data: Option<ConversionCandidates>) {
        self.state.conversion_candidates =
            data.unwrap_or_else(|| self.compute_conversion_candidates());
        debug!(
            candidates = self.state.conversion_candidates.len(),
            "Conversion candidates updated"
        );
        self.fire(Channel::Conversion);
    }

    /// Replace population counts (read from the roster when `None`)
    pub fn update_population_counts(&mut self, data: Option<PopulationCounts>) {
        self.state.population_counts = data.unwrap_or_else(|| self.domain.entries().into_iter().collect());
        debug!(entries = self.state.population_counts.len(), "Population counts updated");
        self.fire(Channel::Population);
    }

    /// Zero every staged candidate amount without recomputing
    ///
    /// Fires [`Channel::Conversion`] only if something was non-zero.
    pub fn clear_pending_staged_selections(&mut self) {
        let mut changed = false;
        for amount in self.state.conversion_candidates.values_mut() {
            if *amount != 0 {
                *amount = 0;
                changed = true;
            }
        }
        if changed {
            self.fire(Channel::Conversion);
        }
    }

    /// Hand the last captured delta to its consumer
    pub fn take_equip_change(&mut self) -> Option<EquipChangeDelta> {
        self.state.last_equip_change.take()
    }

    // ===== Conversions =====

    /// Stage a conversion; returns the amount actually staged
    pub fn stage_conversion(&mut self, from: &EntityId, to: &EntityId, requested: u32) -> u32 {
        let staged = self.ledger.stage(&self.domain, from, to, requested);
        self.update_conversion_candidates(None);
        staged
    }

    /// Amount a staging click requests for `to` with the given modifiers
    pub fn stage_step(&self, modifiers: StepModifiers, to: &EntityId) -> u32 {
        self.stage_step
            .step(modifiers, self.domain.is_capacity_limited(to))
    }

    /// Commit every staged conversion, then refresh population and candidates
    pub fn apply_conversions(&mut self) -> Result<ApplyReport, DomainError> {
        if !self.ledger.has_pending() {
            return Ok(ApplyReport::default());
        }

        let bus = Rc::clone(&self.bus);
        let _pulse = bus.pulse();

        let report = self.ledger.apply_all(&mut self.domain)?;
        self.update_population_counts(None);
        self.update_conversion_candidates(None);
        Ok(report)
    }

    /// Discard every staged conversion
    pub fn clear_conversions(&mut self) {
        if !self.ledger.has_pending() {
            return;
        }
        self.ledger.clear_all();
        self.update_conversion_candidates(None);
    }

    /// Committed count adjusted by staged conversions
    pub fn virtual_count(&self, entity: &EntityId) -> i64 {
        self.ledger.virtual_count(&self.domain, entity)
    }

    /// Largest amount that may currently be staged for `from → to`
    pub fn max_stageable(&self, from: &EntityId, to: &EntityId) -> u32 {
        self.ledger.max_stageable(&self.domain, from, to)
    }

    // ===== Derivations =====

    fn selected_is_capacity_limited(&self) -> bool {
        self.state
            .entity
            .as_ref()
            .is_some_and(|e| self.domain.is_capacity_limited(e))
    }

    fn compute_slot_data(&self) -> SlotDataMap {
        let (Some(entity), Some(sub_item)) = (&self.state.entity, &self.state.sub_item) else {
            return SlotDataMap::new();
        };

        self.domain
            .slots()
            .into_iter()
            .map(|slot| {
                let data = SlotData {
                    content: self.domain.slot_content(entity, sub_item, &slot),
                    staged: self.domain.staged_equip(entity, sub_item, &slot),
                };
                (slot, data)
            })
            .collect()
    }

    fn compute_attribute_data(&self) -> AttributeDataMap {
        let Some(entity) = &self.state.entity else {
            return AttributeDataMap::new();
        };

        self.domain
            .attributes(entity)
            .into_iter()
            .map(|(attribute, value)| {
                let staged = self.domain.staged_training(entity, &attribute);
                (attribute, AttributeData { value, staged })
            })
            .collect()
    }

    fn compute_conversion_candidates(&self) -> ConversionCandidates {
        let Some(entity) = &self.state.entity else {
            return ConversionCandidates::new();
        };

        self.domain
            .conversion_sources(entity)
            .into_iter()
            .map(|source| {
                let net = i64::from(self.ledger.pending_amount(&source, entity))
                    - i64::from(self.ledger.pending_amount(entity, &source));
                (source, net)
            })
            .collect()
    }
}
