//! Core types for stagehand
//!
//! This crate provides the reactive state core behind an in-game editing
//! surface: a session context holding the current selection and its derived
//! caches, a bus that tells views exactly which properties went stale, and a
//! ledger of staged conversions that only touch persistent state on commit.
//!
//! # Core Concepts
//!
//! - **Channel**: a category of change (faction selected, slot mutated, ...)
//! - **Bus**: fans channel fires out to components and handlers, batching
//!   them into pulses
//! - **Bindable**: a view-facing component mapping channels to properties,
//!   deferring notifications while hidden
//! - **SessionContext**: selection state, cache recomputation and firing
//! - **ConversionLedger**: nettable, capacity-clamped staged transfers
//!
//! # Basic Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use stagehand_core::prelude::*;
//! use stagehand_core::testing::{FakeDomain, RecordingSink};
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq)]
//! enum Prop { Name, Slots }
//!
//! impl Property for Prop {
//!     fn name(&self) -> &'static str {
//!         match self { Prop::Name => "Name", Prop::Slots => "Slots" }
//!     }
//! }
//!
//! struct Header { binding: Binding<Prop> }
//!
//! impl Bindable<SessionState> for Header {
//!     type Property = Prop;
//!
//!     fn bindings(&self, channel: Channel) -> &'static [Prop] {
//!         match channel {
//!             Channel::Entity => &[Prop::Name],
//!             Channel::SlotContent => &[Prop::Slots],
//!             _ => &[],
//!         }
//!     }
//!
//!     fn binding(&self) -> &Binding<Prop> { &self.binding }
//!     fn binding_mut(&mut self) -> &mut Binding<Prop> { &mut self.binding }
//! }
//!
//! let domain = FakeDomain::new()
//!     .with_faction("clan", &["militia"])
//!     .with_sub_items("militia", &["battle"])
//!     .with_slots(&["head"]);
//! let mut session = SessionContext::new(domain);
//!
//! let sink = RecordingSink::new();
//! let header = Rc::new(RefCell::new(Header { binding: Binding::new(sink.clone()) }));
//! header.borrow_mut().show();
//! let _registration = session.bus().register(&header);
//!
//! session.reset();
//!
//! // One flush for the whole cascade
//! assert_eq!(sink.flushes(), vec![vec![Prop::Slots, Prop::Name]]);
//! ```

pub mod bus;
pub mod channel;
pub mod component;
pub mod config;
pub mod debug;
pub mod delta;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod property;
pub mod session;
pub mod testing;

// Core trait exports
pub use component::{Bindable, Binding, PropertySink};
pub use property::Property;

// Bus exports
pub use bus::{
    Bus, Handler, HandlerId, Listener, ListenerId, Mailbox, Missed, PulseGuard, Registration,
};
pub use channel::{Channel, ChannelSet};

// Session exports
pub use delta::{capture_equip_change, EquipChangeDelta};
pub use session::{
    AttributeData, AttributeDataMap, ConversionCandidates, PopulationCounts, SessionContext,
    SessionState, SlotData, SlotDataMap,
};

// Ledger exports
pub use ledger::{ApplyReport, ConversionLedger, StepModifiers};

// Domain exports
pub use domain::{
    AttributeId, Catalog, Conversion, Domain, EntityId, FactionId, ItemId, Roster, Rules,
    SlotId, StagedEquip, StagedTraining, SubItemId,
};

// Config and errors
pub use config::{StageStepConfig, StagehandConfig};
pub use error::{ConfigError, DomainError, HandlerError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Bindable, Binding, Bus, Channel, Conversion, Domain, EntityId, HandlerError, Listener,
        Property, PropertySink, Registration, SessionContext, SessionState, StagehandConfig,
        StepModifiers,
    };
}
