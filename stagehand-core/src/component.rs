//! Bindable components with visibility-aware deferred notification

use crate::bus::{Listener, Mailbox, Missed};
use crate::channel::Channel;
use crate::error::HandlerError;
use crate::property::Property;
use std::fmt;
use tracing::trace;

/// Receives property-changed notifications from a flushing component
///
/// This is the only surface the view layer sees: one `property_changed` per
/// dirty property, then `flush_complete` once per flush.
pub trait PropertySink<P> {
    /// A bound property must be re-read
    fn property_changed(&mut self, property: P);

    /// One flush finished
    fn flush_complete(&mut self) {}
}

impl<P, F: FnMut(P)> PropertySink<P> for F {
    fn property_changed(&mut self, property: P) {
        self(property)
    }
}

/// Notification state shared by every bindable component
///
/// Properties marked dirty are never dropped: while the component is hidden
/// they accumulate until it becomes visible and flushes.
pub struct Binding<P: Property> {
    visible: bool,
    pending: Vec<P>,
    queued_while_hidden: bool,
    in_pulse: bool,
    mailbox: Mailbox,
    sink: Box<dyn PropertySink<P>>,
}

impl<P: Property> fmt::Debug for Binding<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("visible", &self.visible)
            .field("pending", &self.pending)
            .field("queued_while_hidden", &self.queued_while_hidden)
            .field("in_pulse", &self.in_pulse)
            .finish()
    }
}

impl<P: Property> Binding<P> {
    /// Create a hidden binding delivering to `sink`
    pub fn new(sink: impl PropertySink<P> + 'static) -> Self {
        Self {
            visible: false,
            pending: Vec::new(),
            queued_while_hidden: false,
            in_pulse: false,
            mailbox: Mailbox::new(),
            sink: Box::new(sink),
        }
    }

    /// Whether the view is currently observed
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Change visibility; becoming visible flushes anything queued while hidden
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        if visible && self.queued_while_hidden && !self.in_pulse {
            self.flush();
        }
    }

    /// Make the view visible
    pub fn show(&mut self) {
        self.set_visible(true);
    }

    /// Hide the view
    pub fn hide(&mut self) {
        self.set_visible(false);
    }

    /// Whether any property is waiting to be flushed, including fires
    /// missed while the component was borrowed
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.mailbox.has_fires()
    }

    /// Whether a batch is currently open for this binding
    pub fn in_pulse(&self) -> bool {
        self.in_pulse
    }

    /// Mark properties dirty without flushing
    pub fn mark(&mut self, properties: &[P]) {
        for &property in properties {
            if !self.pending.contains(&property) {
                self.pending.push(property);
            }
        }
    }

    /// Emit one notification per dirty property, then clear the set
    ///
    /// Flushing with nothing pending emits nothing.
    pub fn flush(&mut self) {
        self.queued_while_hidden = false;
        if self.pending.is_empty() {
            return;
        }

        trace!(count = self.pending.len(), "Flushing properties");
        for property in self.pending.drain(..) {
            self.sink.property_changed(property);
        }
        self.sink.flush_complete();
    }

    fn begin_pulse(&mut self) {
        self.in_pulse = true;
    }

    fn end_pulse(&mut self) {
        self.in_pulse = false;
        if self.visible {
            self.flush();
        } else {
            self.queued_while_hidden = true;
        }
    }
}

/// A view-facing node that turns channel fires into property notifications
///
/// Implementors declare a static channel → property table and expose their
/// [`Binding`]. Every `Bindable` is a bus [`Listener`] through a blanket
/// impl, so it can be registered directly.
///
/// Hooks run synchronously during delivery, only while the component is
/// visible. Hidden components only accumulate property names.
///
/// # Example
///
/// ```
/// use stagehand_core::{Bindable, Binding, Channel, Property};
///
/// #[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// enum Prop { Name }
///
/// impl Property for Prop {
///     fn name(&self) -> &'static str { "Name" }
/// }
///
/// struct NameLabel {
///     binding: Binding<Prop>,
/// }
///
/// impl Bindable<()> for NameLabel {
///     type Property = Prop;
///
///     fn bindings(&self, channel: Channel) -> &'static [Prop] {
///         match channel {
///             Channel::Entity => &[Prop::Name],
///             _ => &[],
///         }
///     }
///
///     fn binding(&self) -> &Binding<Prop> { &self.binding }
///     fn binding_mut(&mut self) -> &mut Binding<Prop> { &mut self.binding }
/// }
/// ```
pub trait Bindable<S: ?Sized> {
    /// Property type of this view
    type Property: Property;

    /// Properties invalidated by `channel`
    fn bindings(&self, channel: Channel) -> &'static [Self::Property];

    /// Notification state
    fn binding(&self) -> &Binding<Self::Property>;

    /// Mutable notification state
    fn binding_mut(&mut self) -> &mut Binding<Self::Property>;

    /// The selected faction changed
    #[allow(unused_variables)]
    fn on_faction_change(&mut self, state: &S) -> Result<(), HandlerError> {
        Ok(())
    }

    /// The selected entity changed
    #[allow(unused_variables)]
    fn on_entity_change(&mut self, state: &S) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Slot data was rebuilt
    #[allow(unused_variables)]
    fn on_slot_content_change(&mut self, state: &S) -> Result<(), HandlerError> {
        Ok(())
    }

    /// The selected slot changed
    #[allow(unused_variables)]
    fn on_slot_change(&mut self, state: &S) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Conversion candidates changed
    #[allow(unused_variables)]
    fn on_conversion_change(&mut self, state: &S) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Whether the view is currently observed
    fn is_visible(&self) -> bool {
        self.binding().is_visible()
    }

    /// Change visibility
    fn set_visible(&mut self, visible: bool) {
        replay_missed::<S, Self>(self);
        self.binding_mut().set_visible(visible);
    }

    /// Make the view visible, flushing anything queued while hidden
    fn show(&mut self) {
        self.set_visible(true);
    }

    /// Hide the view
    fn hide(&mut self) {
        self.set_visible(false);
    }
}

/// Apply deliveries the bus queued while the component was borrowed
///
/// Missed fires only mark properties, the same way a hidden component
/// accumulates them; hooks are not replayed.
fn replay_missed<S: ?Sized, T: Bindable<S> + ?Sized>(component: &mut T) {
    let missed = component.binding().mailbox.take();
    if missed.is_empty() {
        return;
    }

    trace!(count = missed.len(), "Replaying missed deliveries");
    for delivery in missed {
        match delivery {
            Missed::Fire(channel) => {
                let properties = component.bindings(channel);
                let binding = component.binding_mut();
                binding.mark(properties);
                binding.queued_while_hidden = true;
            }
            Missed::BeginPulse => component.binding_mut().begin_pulse(),
            Missed::EndPulse => component.binding_mut().end_pulse(),
        }
    }

    let binding = component.binding_mut();
    if binding.visible && !binding.in_pulse {
        binding.flush();
    }
}

impl<S: ?Sized, T: Bindable<S>> Listener<S> for T {
    fn begin_pulse(&mut self) {
        replay_missed::<S, Self>(self);
        self.binding_mut().begin_pulse();
    }

    fn end_pulse(&mut self) {
        replay_missed::<S, Self>(self);
        self.binding_mut().end_pulse();
    }

    fn mailbox(&self) -> Option<Mailbox> {
        Some(self.binding().mailbox.clone())
    }

    fn catch_up(&mut self) {
        replay_missed::<S, Self>(self);
    }

    fn on_global_pulse(&mut self, channel: Channel, state: &S) -> Result<(), HandlerError> {
        replay_missed::<S, Self>(self);
        let properties = self.bindings(channel);
        self.binding_mut().mark(properties);

        if !self.is_visible() {
            self.binding_mut().queued_while_hidden = true;
            return Ok(());
        }

        let hook = match channel {
            Channel::Faction => self.on_faction_change(state),
            Channel::Entity => self.on_entity_change(state),
            Channel::SlotContent => self.on_slot_content_change(state),
            Channel::Slot => self.on_slot_change(state),
            Channel::Conversion => self.on_conversion_change(state),
            _ => Ok(()),
        };

        let binding = self.binding_mut();
        if !binding.in_pulse && binding.visible {
            binding.flush();
        }

        hook
    }
}
