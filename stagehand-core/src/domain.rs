//! Collaborator contracts and identifiers
//!
//! The core never decides what a legal mutation is, what it costs, or how
//! entities are persisted. It asks the collaborator through these traits:
//!
//! - [`Catalog`]: read-only hierarchy (factions → entities → sub-items → slots)
//! - [`Rules`]: capacities, costs, legality and the mutation itself
//! - [`Roster`]: committed population counts
//!
//! Anything implementing all three is a [`Domain`].

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an id from a string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw id
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(
    /// A faction owning a set of entities
    FactionId
);
define_id!(
    /// A customizable entity
    EntityId
);
define_id!(
    /// A sub-item of an entity (e.g. one loadout)
    SubItemId
);
define_id!(
    /// An equipment slot
    SlotId
);
define_id!(
    /// A trainable attribute
    AttributeId
);
define_id!(
    /// An item that can occupy a slot
    ItemId
);

/// An equip change waiting to be committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedEquip {
    /// Item that will occupy the slot
    pub item: ItemId,
    /// Time units left before it is applied
    pub remaining: u32,
}

/// Training waiting to be committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedTraining {
    /// Points that will be added
    pub points: u32,
    /// Time units left before they are applied
    pub remaining: u32,
}

/// A transfer of `amount` units from one entity to another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conversion {
    pub from: EntityId,
    pub to: EntityId,
    pub amount: u32,
}

impl Conversion {
    pub fn new(from: EntityId, to: EntityId, amount: u32) -> Self {
        Self { from, to, amount }
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{} x{}", self.from, self.to, self.amount)
    }
}

/// Read-only view of the editable hierarchy
pub trait Catalog {
    /// Faction selected when none is given
    fn default_faction(&self) -> Option<FactionId>;

    /// Entities of a faction; the first one is the default pick
    fn entities(&self, faction: &FactionId) -> Vec<EntityId>;

    /// Sub-items of an entity; the first one is canonical
    fn sub_items(&self, entity: &EntityId) -> Vec<SubItemId>;

    /// Every slot, in display order; the first one is the default selection
    fn slots(&self) -> Vec<SlotId>;

    /// Committed content of a slot
    fn slot_content(&self, entity: &EntityId, sub_item: &SubItemId, slot: &SlotId)
        -> Option<ItemId>;

    /// Staged change for a slot
    fn staged_equip(
        &self,
        entity: &EntityId,
        sub_item: &SubItemId,
        slot: &SlotId,
    ) -> Option<StagedEquip>;

    /// Attribute values of an entity
    fn attributes(&self, entity: &EntityId) -> Vec<(AttributeId, i32)>;

    /// Staged training for an attribute
    fn staged_training(&self, entity: &EntityId, attribute: &AttributeId)
        -> Option<StagedTraining>;

    /// Entities that can be converted into `entity`
    ///
    /// Empty for entities that are not conversion targets.
    fn conversion_sources(&self, entity: &EntityId) -> Vec<EntityId>;
}

/// Domain rules: capacities, costs and the mutations themselves
pub trait Rules {
    /// Whether `entity` has a population cap
    fn is_capacity_limited(&self, entity: &EntityId) -> bool;

    /// Population cap of a capacity-limited entity
    fn capacity(&self, entity: &EntityId) -> u32;

    /// Resource cost of converting one unit from `from` into `to`
    fn cost_per_unit(&self, from: &EntityId, to: &EntityId) -> u64;

    /// Resources currently available
    fn budget(&self) -> u64;

    /// Whether the mutation may be applied at all
    #[allow(unused_variables)]
    fn is_legal_mutation(&self, conversion: &Conversion) -> bool {
        true
    }

    /// Total resource cost of a mutation
    fn cost(&self, conversion: &Conversion) -> u64 {
        self.cost_per_unit(&conversion.from, &conversion.to) * u64::from(conversion.amount)
    }

    /// Apply a mutation to persistent state
    fn apply_mutation(&mut self, conversion: &Conversion) -> Result<(), DomainError>;

    /// Repair an entity after external changes
    #[allow(unused_variables)]
    fn integrity_fix(&mut self, entity: &EntityId) {}
}

/// Committed population counts
pub trait Roster {
    /// Every entity present with its count
    fn entries(&self) -> Vec<(EntityId, u32)>;

    /// Committed count of one entity
    fn count_of(&self, entity: &EntityId) -> u32 {
        self.entries()
            .into_iter()
            .find(|(e, _)| e == entity)
            .map(|(_, count)| count)
            .unwrap_or(0)
    }
}

/// Everything the session context needs from its collaborator
pub trait Domain: Catalog + Rules + Roster {}

impl<T: Catalog + Rules + Roster> Domain for T {}
