//! stagehand: reactive session state for in-game editors
//!
//! Views subscribe to channels, the session context fires them as the
//! selection changes, and each visible view gets exactly one flush of
//! stale properties per logical operation. Hidden views catch up when shown.
//!
//! # Example
//! ```ignore
//! use stagehand::prelude::*;
//!
//! #[derive(Property, Clone, Copy, PartialEq, Eq, Debug)]
//! enum PanelProperty {
//!     Name,
//!     Tier,
//! }
//!
//! struct Panel {
//!     binding: Binding<PanelProperty>,
//! }
//!
//! impl Bindable<SessionState> for Panel {
//!     type Property = PanelProperty;
//!
//!     fn bindings(&self, channel: Channel) -> &'static [PanelProperty] {
//!         match channel {
//!             Channel::Entity => &[PanelProperty::Name, PanelProperty::Tier],
//!             _ => &[],
//!         }
//!     }
//!
//!     fn binding(&self) -> &Binding<PanelProperty> { &self.binding }
//!     fn binding_mut(&mut self) -> &mut Binding<PanelProperty> { &mut self.binding }
//! }
//! ```

// Re-export everything from core
pub use stagehand_core::*;

// Re-export derive macros
pub use stagehand_macros::Property;

/// Prelude for convenient imports
pub mod prelude {
    // Traits and types
    pub use stagehand_core::prelude::*;

    // Debug
    pub use stagehand_core::debug::{DebugSection, DebugState, FireLogConfig};

    // Derive macros
    pub use stagehand_macros::Property;
}
