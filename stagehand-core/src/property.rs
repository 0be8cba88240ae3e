//! Property trait for typed view bindings

use std::fmt::Debug;

/// A bindable property exposed by a view
///
/// Properties are the unit of change notification: when a channel fires,
/// each subscribed component marks the properties it maps to that channel
/// as dirty, and later emits one notification per dirty property.
///
/// Use `#[derive(Property)]` from `stagehand-macros` on a unit-only enum to
/// auto-implement this trait.
///
/// # Example
/// ```
/// use stagehand_core::Property;
///
/// #[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// enum PanelProperty {
///     Name,
///     Tier,
/// }
///
/// impl Property for PanelProperty {
///     fn name(&self) -> &'static str {
///         match self {
///             PanelProperty::Name => "Name",
///             PanelProperty::Tier => "Tier",
///         }
///     }
/// }
///
/// assert_eq!(PanelProperty::Tier.name(), "Tier");
/// ```
pub trait Property: Copy + Eq + Debug + 'static {
    /// Name the view layer binds against
    fn name(&self) -> &'static str;
}
