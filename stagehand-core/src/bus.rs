//! Invalidation bus: named channels fanned out to components and handlers
//!
//! The bus decouples "something changed" from "who needs to know". Two kinds
//! of parties can listen:
//!
//! - **Listeners** (usually [`Bindable`](crate::Bindable) components) are
//!   registered through a weak reference and receive every fire, plus
//!   pulse begin/end notifications.
//! - **Handlers** are closures subscribed to a single channel.
//!
//! Everything is single-threaded and synchronous: a fire delivers to every
//! party before it returns. A listener that is already borrowed when a fire
//! or pulse boundary reaches it gets the delivery queued in its [`Mailbox`]
//! and replays it once it is free again.

use crate::channel::{Channel, ChannelSet};
use crate::config::StagehandConfig;
use crate::debug::{FireLog, FireLogConfig};
use crate::error::HandlerError;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// A party notified of every fire and of pulse boundaries
///
/// `S` is the state snapshot handed to listeners during delivery.
pub trait Listener<S: ?Sized> {
    /// A batch started; defer flushing until [`end_pulse`](Self::end_pulse)
    fn begin_pulse(&mut self);

    /// The outermost batch ended
    fn end_pulse(&mut self);

    /// A channel fired
    fn on_global_pulse(&mut self, channel: Channel, state: &S) -> Result<(), HandlerError>;

    /// Queue the bus writes to when this listener is already borrowed
    ///
    /// Listeners without a mailbox lose deliveries made while they are busy.
    fn mailbox(&self) -> Option<Mailbox> {
        None
    }

    /// Process deliveries queued in the mailbox
    fn catch_up(&mut self) {}
}

/// Delivery a listener could not receive because it was borrowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missed {
    Fire(Channel),
    BeginPulse,
    EndPulse,
}

/// Shared queue of missed deliveries
///
/// The bus pushes into it without borrowing the listener; the listener
/// drains it in [`Listener::catch_up`].
#[derive(Debug, Clone, Default)]
pub struct Mailbox(Rc<RefCell<Vec<Missed>>>);

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, missed: Missed) {
        self.0.borrow_mut().push(missed);
    }

    /// Drain everything queued, oldest first
    pub fn take(&self) -> Vec<Missed> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Whether a missed fire is waiting
    pub fn has_fires(&self) -> bool {
        self.0
            .borrow()
            .iter()
            .any(|m| matches!(m, Missed::Fire(_)))
    }
}

/// Closure subscribed to a single channel
pub type Handler<S> = Box<dyn FnMut(&S) -> Result<(), HandlerError>>;

/// Identifier returned by [`Bus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Identifier of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type SharedListener<S> = Rc<RefCell<dyn Listener<S>>>;
type WeakListener<S> = Weak<RefCell<dyn Listener<S>>>;
type SharedHandler<S> = Rc<RefCell<Handler<S>>>;

/// Registered party; listeners and handlers share one list so delivery
/// follows registration order across both kinds
enum Party<S: ?Sized> {
    Listener {
        id: ListenerId,
        listener: WeakListener<S>,
        mailbox: Option<Mailbox>,
    },
    Handler {
        id: HandlerId,
        channel: Channel,
        handler: SharedHandler<S>,
    },
}

/// Upgraded party for one delivery pass
enum Target<S: ?Sized> {
    Listener(SharedListener<S>, Option<Mailbox>),
    Handler(SharedHandler<S>),
}

struct BusInner<S: ?Sized> {
    parties: Vec<Party<S>>,
    stalled: Vec<WeakListener<S>>,
    disabled: ChannelSet,
    log: Option<FireLog>,
}

impl<S: ?Sized> BusInner<S> {
    fn live_listeners(&self) -> usize {
        self.parties
            .iter()
            .filter(|p| {
                matches!(p, Party::Listener { listener, .. } if listener.strong_count() > 0)
            })
            .count()
    }

    fn handlers(&self) -> impl Iterator<Item = (HandlerId, Channel)> + '_ {
        self.parties.iter().filter_map(|p| match p {
            Party::Handler { id, channel, .. } => Some((*id, *channel)),
            Party::Listener { .. } => None,
        })
    }

    /// Upgrade parties interested in `channel` (every listener when `None`),
    /// pruning listeners that were dropped
    fn snapshot(&mut self, channel: Option<Channel>) -> Vec<Target<S>> {
        let mut live = Vec::with_capacity(self.parties.len());
        self.parties.retain(|party| match party {
            Party::Listener {
                listener, mailbox, ..
            } => match listener.upgrade() {
                Some(listener) => {
                    live.push(Target::Listener(listener, mailbox.clone()));
                    true
                }
                None => false,
            },
            Party::Handler {
                channel: subscribed,
                handler,
                ..
            } => {
                if channel == Some(*subscribed) {
                    live.push(Target::Handler(Rc::clone(handler)));
                }
                true
            }
        });
        live
    }
}

/// Event bus fanning channel fires out to listeners and handlers
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use stagehand_core::{Bus, Channel};
///
/// let bus: Bus<()> = Bus::new();
/// let hits = Rc::new(Cell::new(0));
///
/// let counter = Rc::clone(&hits);
/// bus.subscribe(Channel::Training, move |_: &()| {
///     counter.set(counter.get() + 1);
///     Ok(())
/// });
///
/// bus.fire(Channel::Training, &());
/// bus.fire(Channel::Faction, &());
/// assert_eq!(hits.get(), 1);
/// ```
pub struct Bus<S: ?Sized + 'static> {
    inner: RefCell<BusInner<S>>,
    depth: Cell<u32>,
    next_id: Cell<u64>,
}

impl<S: ?Sized + 'static> Default for Bus<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized + 'static> fmt::Debug for Bus<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Bus")
            .field("listeners", &inner.live_listeners())
            .field("handlers", &inner.handlers().count())
            .field("stalled", &inner.stalled.len())
            .field("disabled", &inner.disabled)
            .field("depth", &self.depth.get())
            .finish()
    }
}

impl<S: ?Sized + 'static> Bus<S> {
    /// Create a bus with every channel enabled and no fire log
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(BusInner {
                parties: Vec::new(),
                stalled: Vec::new(),
                disabled: ChannelSet::empty(),
                log: None,
            }),
            depth: Cell::new(0),
            next_id: Cell::new(0),
        }
    }

    /// Create a bus from configuration (disabled channels, fire log)
    pub fn with_config(config: &StagehandConfig) -> Self {
        let bus = Self::new();
        {
            let mut inner = bus.inner.borrow_mut();
            inner.disabled = config.disabled_channels.iter().copied().collect();
        }
        if config.fire_log.enabled {
            bus.set_fire_log(config.fire_log.clone());
        }
        bus
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    // ===== Registration =====

    /// Register a listener
    ///
    /// The bus only keeps a weak reference: dropping the last `Rc` to the
    /// listener silently removes it. Dropping the returned [`Registration`]
    /// unregisters it explicitly. A listener registered while a pulse is
    /// open joins that pulse.
    #[must_use = "dropping the registration unregisters the listener"]
    pub fn register<L>(self: &Rc<Self>, listener: &Rc<RefCell<L>>) -> Registration<S>
    where
        L: Listener<S> + 'static,
    {
        let shared: SharedListener<S> = listener.clone();
        let mailbox = listener.try_borrow().ok().and_then(|l| l.mailbox());
        let id = ListenerId(self.next_id());
        self.inner.borrow_mut().parties.push(Party::Listener {
            id,
            listener: Rc::downgrade(&shared),
            mailbox: mailbox.clone(),
        });
        trace!(listener = id.0, "Listener registered");

        if self.in_pulse() {
            let joined = self.reach(&shared, mailbox.as_ref(), Missed::BeginPulse, |l| {
                l.begin_pulse();
                Ok(())
            });
            if let Err(error) = joined {
                warn!(listener = id.0, %error, "Listener missed the open pulse");
            }
        }

        Registration {
            bus: Rc::downgrade(self),
            id,
        }
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.parties.len();
        inner.parties.retain(|party| match party {
            Party::Listener {
                id: lid, listener, ..
            } => *lid != id && listener.strong_count() > 0,
            Party::Handler { .. } => true,
        });
        let removed = inner.parties.len() < before;
        trace!(listener = id.0, "Listener unregistered");
        removed
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().live_listeners()
    }

    /// Subscribe a handler to a single channel
    pub fn subscribe<F>(&self, channel: Channel, handler: F) -> HandlerId
    where
        F: FnMut(&S) -> Result<(), HandlerError> + 'static,
    {
        let id = HandlerId(self.next_id());
        let boxed: Handler<S> = Box::new(handler);
        self.inner.borrow_mut().parties.push(Party::Handler {
            id,
            channel,
            handler: Rc::new(RefCell::new(boxed)),
        });
        id
    }

    /// Remove a handler; returns false if it was not subscribed
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.parties.len();
        inner
            .parties
            .retain(|party| !matches!(party, Party::Handler { id: hid, .. } if *hid == id));
        inner.parties.len() < before
    }

    /// Number of handlers subscribed to a channel
    pub fn handler_count(&self, channel: Channel) -> usize {
        self.inner
            .borrow()
            .handlers()
            .filter(|(_, c)| *c == channel)
            .count()
    }

    // ===== Channel state =====

    /// Stop invoking anything on `channel`; fires are still logged
    pub fn disable(&self, channel: Channel) {
        self.inner.borrow_mut().disabled.insert(channel.flag());
    }

    /// Resume delivery on `channel`
    pub fn enable(&self, channel: Channel) {
        self.inner.borrow_mut().disabled.remove(channel.flag());
    }

    /// Whether fires on `channel` are delivered
    pub fn is_enabled(&self, channel: Channel) -> bool {
        !self.inner.borrow().disabled.has(channel)
    }

    /// Start keeping an in-memory fire log
    pub fn set_fire_log(&self, config: FireLogConfig) {
        self.inner.borrow_mut().log = Some(FireLog::new(config));
    }

    /// The fire log, if enabled
    pub fn fire_log(&self) -> Option<Ref<'_, FireLog>> {
        Ref::filter_map(self.inner.borrow(), |inner| inner.log.as_ref()).ok()
    }

    /// Clear the fire log, if enabled
    pub fn clear_fire_log(&self) {
        if let Some(log) = self.inner.borrow_mut().log.as_mut() {
            log.clear();
        }
    }

    // ===== Firing =====

    /// Deliver `channel` to every listener and every handler subscribed to
    /// it, in registration order
    ///
    /// A failing party is logged and skipped; the others still receive the
    /// fire. A listener that is already borrowed gets the fire queued in its
    /// mailbox instead.
    pub fn fire(&self, channel: Channel, state: &S) {
        let (targets, enabled) = {
            let mut inner = self.inner.borrow_mut();
            let enabled = !inner.disabled.has(channel);
            let targets = inner.snapshot(Some(channel));
            if let Some(log) = inner.log.as_mut() {
                log.record(channel, enabled, targets.len());
            }
            (targets, enabled)
        };

        if !enabled {
            debug!(channel = %channel, "Fire on disabled channel suppressed");
            return;
        }

        debug!(channel = %channel, parties = targets.len(), "Fire");

        for target in targets {
            let result = match target {
                Target::Listener(listener, mailbox) => {
                    self.reach(&listener, mailbox.as_ref(), Missed::Fire(channel), |l| {
                        l.on_global_pulse(channel, state)
                    })
                }
                Target::Handler(handler) => match handler.try_borrow_mut() {
                    Ok(mut h) => (*h)(state),
                    Err(_) => Err(HandlerError::Reentrant),
                },
            };
            if let Err(error) = result {
                warn!(channel = %channel, %error, "Delivery failed during fire");
            }
        }

        self.resume_stalled();
    }

    /// Fire a sequence of channels as a single pulse
    pub fn fire_sequence(&self, state: &S, channels: &[Channel]) {
        let _pulse = self.pulse();
        for &channel in channels {
            self.fire(channel, state);
        }
    }

    /// Run `action` inside a pulse so every listener flushes once at the end
    pub fn fire_batch<R>(&self, action: impl FnOnce() -> R) -> R {
        let _pulse = self.pulse();
        action()
    }

    /// Open a pulse that ends when the guard drops
    pub fn pulse(&self) -> PulseGuard<'_, S> {
        self.begin_pulse();
        PulseGuard { bus: self }
    }

    /// Enter batch mode; only the outermost call notifies listeners
    pub fn begin_pulse(&self) {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        if depth == 1 {
            trace!("Pulse begin");
            self.notify_listeners(Missed::BeginPulse, |l| l.begin_pulse());
        }
    }

    /// Leave batch mode; the outermost call flushes every listener
    pub fn end_pulse(&self) {
        let depth = self.depth.get();
        if depth == 0 {
            return;
        }
        self.depth.set(depth - 1);
        if depth == 1 {
            trace!("Pulse end");
            self.notify_listeners(Missed::EndPulse, |l| l.end_pulse());
            self.resume_stalled();
        }
    }

    /// Whether a pulse is open
    pub fn in_pulse(&self) -> bool {
        self.depth.get() > 0
    }

    /// Let listeners that missed deliveries while borrowed catch up
    ///
    /// Runs automatically after every fire and outermost pulse end; call it
    /// after releasing a listener borrowed across a session mutation to
    /// deliver right away. Listeners still borrowed stay queued.
    pub fn resume_stalled(&self) {
        if self.in_pulse() {
            return;
        }
        let stalled = std::mem::take(&mut self.inner.borrow_mut().stalled);
        for weak in stalled {
            let Some(listener) = weak.upgrade() else {
                continue;
            };
            let busy = match listener.try_borrow_mut() {
                Ok(mut l) => {
                    l.catch_up();
                    false
                }
                Err(_) => true,
            };
            if busy {
                self.inner.borrow_mut().stalled.push(weak);
            }
        }
    }

    /// Number of listeners waiting to catch up
    pub fn stalled_count(&self) -> usize {
        self.inner.borrow().stalled.len()
    }

    fn notify_listeners(&self, missed: Missed, mut action: impl FnMut(&mut dyn Listener<S>)) {
        let targets = self.inner.borrow_mut().snapshot(None);
        for target in targets {
            if let Target::Listener(listener, mailbox) = target {
                let result = self.reach(&listener, mailbox.as_ref(), missed, |l| {
                    action(l);
                    Ok(())
                });
                if let Err(error) = result {
                    warn!(%error, "Listener skipped at pulse boundary");
                }
            }
        }
    }

    /// Run `action` on a listener, or queue `missed` in its mailbox when it
    /// is already borrowed
    fn reach(
        &self,
        listener: &SharedListener<S>,
        mailbox: Option<&Mailbox>,
        missed: Missed,
        action: impl FnOnce(&mut dyn Listener<S>) -> Result<(), HandlerError>,
    ) -> Result<(), HandlerError> {
        if let Ok(mut l) = listener.try_borrow_mut() {
            return action(&mut *l);
        }

        let Some(mailbox) = mailbox else {
            return Err(HandlerError::Reentrant);
        };
        trace!(?missed, "Listener busy, delivery queued");
        mailbox.push(missed);

        let weak = Rc::downgrade(listener);
        let mut inner = self.inner.borrow_mut();
        if !inner.stalled.iter().any(|w| w.ptr_eq(&weak)) {
            inner.stalled.push(weak);
        }
        Ok(())
    }
}

/// Ends a pulse on drop
#[must_use = "the pulse ends as soon as the guard is dropped"]
pub struct PulseGuard<'a, S: ?Sized + 'static> {
    bus: &'a Bus<S>,
}

impl<S: ?Sized + 'static> Drop for PulseGuard<'_, S> {
    fn drop(&mut self) {
        self.bus.end_pulse();
    }
}

/// Keeps a listener registered; unregisters on drop
#[must_use = "dropping the registration unregisters the listener"]
pub struct Registration<S: ?Sized + 'static> {
    bus: Weak<Bus<S>>,
    id: ListenerId,
}

impl<S: ?Sized + 'static> Registration<S> {
    /// The listener's id on the bus
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<S: ?Sized + 'static> fmt::Debug for Registration<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

impl<S: ?Sized + 'static> Drop for Registration<S> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tracker {
        fired: Vec<Channel>,
        begins: usize,
        ends: usize,
        fail_on: Option<Channel>,
        order: Option<Rc<RefCell<Vec<&'static str>>>>,
        mailbox: Option<Mailbox>,
    }

    impl Listener<()> for Tracker {
        fn begin_pulse(&mut self) {
            self.begins += 1;
        }

        fn end_pulse(&mut self) {
            self.ends += 1;
        }

        fn on_global_pulse(&mut self, channel: Channel, _state: &()) -> Result<(), HandlerError> {
            self.fired.push(channel);
            if let Some(order) = &self.order {
                order.borrow_mut().push("listener");
            }
            if self.fail_on == Some(channel) {
                return Err(HandlerError::failed("tracker"));
            }
            Ok(())
        }

        fn mailbox(&self) -> Option<Mailbox> {
            self.mailbox.clone()
        }

        fn catch_up(&mut self) {
            let Some(mailbox) = self.mailbox.clone() else {
                return;
            };
            for missed in mailbox.take() {
                match missed {
                    Missed::Fire(channel) => self.fired.push(channel),
                    Missed::BeginPulse => self.begins += 1,
                    Missed::EndPulse => self.ends += 1,
                }
            }
        }
    }

    fn tracker() -> Rc<RefCell<Tracker>> {
        Rc::new(RefCell::new(Tracker::default()))
    }

    #[test]
    fn test_fire_reaches_listeners_in_order() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();
        let _reg = bus.register(&a);

        bus.fire(Channel::Faction, &());
        bus.fire(Channel::Slot, &());

        assert_eq!(a.borrow().fired, vec![Channel::Faction, Channel::Slot]);
    }

    #[test]
    fn test_delivery_follows_registration_order_across_kinds() {
        let bus = Rc::new(Bus::<()>::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&order);
        bus.subscribe(Channel::Entity, move |_| {
            log.borrow_mut().push("first handler");
            Ok(())
        });
        let a = tracker();
        a.borrow_mut().order = Some(Rc::clone(&order));
        let _reg = bus.register(&a);
        let log = Rc::clone(&order);
        bus.subscribe(Channel::Entity, move |_| {
            log.borrow_mut().push("last handler");
            Ok(())
        });

        bus.fire(Channel::Entity, &());

        assert_eq!(
            *order.borrow(),
            vec!["first handler", "listener", "last handler"]
        );
    }

    #[test]
    fn test_listener_registered_mid_pulse_joins_it() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();

        let pulse = bus.pulse();
        let _reg = bus.register(&a);
        assert_eq!(a.borrow().begins, 1);

        bus.fire(Channel::Slot, &());
        drop(pulse);

        let tracker = a.borrow();
        assert_eq!(tracker.fired, vec![Channel::Slot]);
        assert_eq!(tracker.ends, 1);
    }

    #[test]
    fn test_busy_listener_catches_up_after_release() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();
        a.borrow_mut().mailbox = Some(Mailbox::new());
        let _reg = bus.register(&a);

        {
            let _busy = a.borrow_mut();
            bus.fire_sequence(&(), &[Channel::Faction, Channel::Entity]);
            assert_eq!(bus.stalled_count(), 1);
        }
        assert!(a.borrow().fired.is_empty());

        bus.resume_stalled();
        assert_eq!(bus.stalled_count(), 0);

        let tracker = a.borrow();
        assert_eq!(tracker.fired, vec![Channel::Faction, Channel::Entity]);
        assert_eq!(tracker.begins, 1);
        assert_eq!(tracker.ends, 1);
    }

    #[test]
    fn test_busy_listener_without_mailbox_is_skipped() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();
        let _reg = bus.register(&a);

        {
            let _busy = a.borrow_mut();
            bus.fire(Channel::Faction, &());
        }

        assert_eq!(bus.stalled_count(), 0);
        assert!(a.borrow().fired.is_empty());
    }

    #[test]
    fn test_registration_drop_unregisters() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();
        let reg = bus.register(&a);
        assert_eq!(bus.listener_count(), 1);

        drop(reg);
        assert_eq!(bus.listener_count(), 0);

        bus.fire(Channel::Faction, &());
        assert!(a.borrow().fired.is_empty());
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();
        let _reg = bus.register(&a);

        drop(a);
        bus.fire(Channel::Faction, &());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let bus = Rc::new(Bus::<()>::new());
        let failing = tracker();
        failing.borrow_mut().fail_on = Some(Channel::Entity);
        let healthy = tracker();
        let _r1 = bus.register(&failing);
        let _r2 = bus.register(&healthy);

        bus.fire(Channel::Entity, &());

        assert_eq!(failing.borrow().fired, vec![Channel::Entity]);
        assert_eq!(healthy.borrow().fired, vec![Channel::Entity]);
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let bus = Bus::<()>::new();
        let hits = Rc::new(Cell::new(0));

        bus.subscribe(Channel::Training, |_| Err(HandlerError::failed("boom")));
        let counter = Rc::clone(&hits);
        bus.subscribe(Channel::Training, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        bus.fire(Channel::Training, &());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = Bus::<()>::new();
        let id = bus.subscribe(Channel::Slot, |_| Ok(()));
        assert_eq!(bus.handler_count(Channel::Slot), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.handler_count(Channel::Slot), 0);
    }

    #[test]
    fn test_disabled_channel_is_logged_but_not_delivered() {
        let bus = Rc::new(Bus::<()>::new());
        bus.set_fire_log(FireLogConfig::with_capacity(10));
        let a = tracker();
        let _reg = bus.register(&a);

        bus.disable(Channel::Appearance);
        bus.fire(Channel::Appearance, &());
        assert!(a.borrow().fired.is_empty());

        let log = bus.fire_log().unwrap();
        let record = log.entries().next().unwrap();
        assert_eq!(record.channel, Channel::Appearance);
        assert!(!record.delivered);
        drop(log);

        bus.enable(Channel::Appearance);
        bus.fire(Channel::Appearance, &());
        assert_eq!(a.borrow().fired, vec![Channel::Appearance]);
    }

    #[test]
    fn test_nested_pulses_notify_once() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();
        let _reg = bus.register(&a);

        bus.fire_batch(|| {
            bus.fire_batch(|| bus.fire(Channel::Faction, &()));
            assert!(bus.in_pulse());
        });

        assert!(!bus.in_pulse());
        assert_eq!(a.borrow().begins, 1);
        assert_eq!(a.borrow().ends, 1);
    }

    #[test]
    fn test_unbalanced_end_pulse_is_ignored() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();
        let _reg = bus.register(&a);

        bus.end_pulse();
        assert_eq!(a.borrow().ends, 0);
        assert!(!bus.in_pulse());
    }

    #[test]
    fn test_fire_sequence_is_one_pulse() {
        let bus = Rc::new(Bus::<()>::new());
        let a = tracker();
        let _reg = bus.register(&a);

        bus.fire_sequence(&(), &[Channel::Faction, Channel::Entity]);

        let tracker = a.borrow();
        assert_eq!(tracker.fired, vec![Channel::Faction, Channel::Entity]);
        assert_eq!(tracker.begins, 1);
        assert_eq!(tracker.ends, 1);
    }

    #[test]
    fn test_reentrant_handler_fire_is_skipped() {
        let bus = Rc::new(Bus::<()>::new());
        let hits = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&bus);
        let counter = Rc::clone(&hits);
        bus.subscribe(Channel::Population, move |_| {
            counter.set(counter.get() + 1);
            if let Some(bus) = weak.upgrade() {
                bus.fire(Channel::Population, &());
            }
            Ok(())
        });

        bus.fire(Channel::Population, &());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_with_config_disables_channels() {
        let config = StagehandConfig {
            disabled_channels: vec![Channel::Population],
            fire_log: FireLogConfig::with_capacity(4),
            ..Default::default()
        };
        let bus = Bus::<()>::with_config(&config);

        assert!(!bus.is_enabled(Channel::Population));
        assert!(bus.is_enabled(Channel::Faction));
        assert!(bus.fire_log().is_some());
    }
}
