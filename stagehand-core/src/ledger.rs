//! Staged conversion ledger
//!
//! Tentative transfers between sibling entities are accumulated here and
//! only reach the domain on [`ConversionLedger::apply_all`]. Staging nets
//! opposite flows against each other and clamps every request to what the
//! user could actually afford:
//!
//! - never more than the origin's virtual count
//! - for capacity-limited targets, never past the target's cap
//! - for capacity-limited targets, never past the remaining budget
//!
//! At most one capacity-limited target is staged for at a time; staging
//! towards another one starts over with an empty ledger.

use crate::config::StageStepConfig;
use crate::debug::{DebugSection, DebugState};
use crate::domain::{Conversion, EntityId, Roster, Rules};
use crate::error::DomainError;
use bitflags::bitflags;
use tracing::{debug, warn};

bitflags! {
    /// Modifier keys held during a staging click
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StepModifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
    }
}

impl StageStepConfig {
    /// Amount requested by one staging click
    ///
    /// Ctrl wins over shift. `capped` is whether the target is
    /// capacity-limited.
    pub fn step(&self, modifiers: StepModifiers, capped: bool) -> u32 {
        if modifiers.contains(StepModifiers::CTRL) {
            if capped {
                self.ctrl_capped
            } else {
                self.ctrl_uncapped
            }
        } else if modifiers.contains(StepModifiers::SHIFT) {
            self.shift
        } else {
            1
        }
    }
}

/// Outcome of [`ConversionLedger::apply_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Orders applied, with the amount actually committed
    pub applied: Vec<Conversion>,
    /// Orders dropped because they were illegal or clamped to zero
    pub skipped: Vec<Conversion>,
    /// Orders the domain refused
    pub failed: Vec<(Conversion, DomainError)>,
}

impl ApplyReport {
    /// Total units committed
    pub fn applied_total(&self) -> u64 {
        self.applied.iter().map(|c| u64::from(c.amount)).sum()
    }

    /// Whether every order was applied in full
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Pending transfer orders, at most one per ordered `(from, to)` pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionLedger {
    orders: Vec<Conversion>,
    tracked_target: Option<EntityId>,
}

impl ConversionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders in the order they were first staged
    pub fn orders(&self) -> &[Conversion] {
        &self.orders
    }

    /// Capacity-limited target currently staged for
    pub fn tracked_target(&self) -> Option<&EntityId> {
        self.tracked_target.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        !self.orders.is_empty()
    }

    /// Amount staged for `from → to` (0 when no order exists)
    pub fn pending_amount(&self, from: &EntityId, to: &EntityId) -> u32 {
        self.position(from, to)
            .map(|i| self.orders[i].amount)
            .unwrap_or(0)
    }

    /// Units moved by all orders
    pub fn pending_total_count(&self) -> u64 {
        self.orders.iter().map(|o| u64::from(o.amount)).sum()
    }

    /// Resource cost of all orders at current prices
    pub fn pending_total_cost<R: Rules + ?Sized>(&self, rules: &R) -> u64 {
        self.orders.iter().map(|o| rules.cost(o)).sum()
    }

    /// Committed count adjusted by every staged order touching `entity`
    pub fn virtual_count<R: Roster + ?Sized>(&self, roster: &R, entity: &EntityId) -> i64 {
        let mut count = i64::from(roster.count_of(entity));
        for order in &self.orders {
            if &order.to == entity {
                count += i64::from(order.amount);
            }
            if &order.from == entity {
                count -= i64::from(order.amount);
            }
        }
        count
    }

    /// Largest amount that may currently be staged for `from → to`
    pub fn max_stageable<D>(&self, domain: &D, from: &EntityId, to: &EntityId) -> u32
    where
        D: Rules + Roster + ?Sized,
    {
        if from == to {
            return 0;
        }

        let mut max = self.virtual_count(domain, from).max(0);
        if max == 0 {
            return 0;
        }

        if domain.is_capacity_limited(to) {
            let room = i64::from(domain.capacity(to)) - self.virtual_count(domain, to);
            max = max.min(room.max(0));

            let cost_per = domain.cost_per_unit(from, to);
            if cost_per > 0 {
                let left = domain
                    .budget()
                    .saturating_sub(self.pending_total_cost(domain));
                max = max.min(i64::try_from(left / cost_per).unwrap_or(i64::MAX));
            }
        }

        u32::try_from(max.max(0)).unwrap_or(u32::MAX)
    }

    /// Stage `requested` units from `from` into `to`
    ///
    /// Returns the amount actually staged after clamping; `0` means the
    /// request was dropped. Opposite orders are reduced before this
    /// direction grows.
    pub fn stage<D>(&mut self, domain: &D, from: &EntityId, to: &EntityId, requested: u32) -> u32
    where
        D: Rules + Roster + ?Sized,
    {
        if requested == 0 || from == to {
            return 0;
        }

        if domain.is_capacity_limited(to) && self.tracked_target.as_ref() != Some(to) {
            if self.has_pending() {
                debug!(target_entity = %to, dropped = self.orders.len(), "Staging target changed, ledger cleared");
            }
            self.orders.clear();
            self.tracked_target = Some(to.clone());
        }

        let amount = requested.min(self.max_stageable(domain, from, to));
        if amount == 0 {
            return 0;
        }

        let mut remainder = amount;
        if let Some(i) = self.position(to, from) {
            let cancel = remainder.min(self.orders[i].amount);
            self.orders[i].amount -= cancel;
            if self.orders[i].amount == 0 {
                self.orders.remove(i);
            }
            remainder -= cancel;
        }

        if remainder > 0 {
            match self.position(from, to) {
                Some(i) => self.orders[i].amount += remainder,
                None => self
                    .orders
                    .push(Conversion::new(from.clone(), to.clone(), remainder)),
            }
        }

        debug!(%from, %to, requested, staged = amount, "Conversion staged");
        amount
    }

    /// Discard every order
    pub fn clear_all(&mut self) {
        self.orders.clear();
    }

    /// Commit every order to the domain, in staging order, then clear
    ///
    /// Each order is clamped again against committed counts, because earlier
    /// orders in the same batch change the real roster. Orders that are
    /// illegal or clamp to zero are skipped; a failing order is logged and
    /// recorded without stopping the rest.
    ///
    /// Fails without touching anything when the staged total exceeds the
    /// budget.
    pub fn apply_all<D>(&mut self, domain: &mut D) -> Result<ApplyReport, DomainError>
    where
        D: Rules + Roster + ?Sized,
    {
        let mut report = ApplyReport::default();
        if self.orders.is_empty() {
            return Ok(report);
        }

        let needed = self.pending_total_cost(domain);
        let available = domain.budget();
        if needed > available {
            return Err(DomainError::InsufficientBudget { needed, available });
        }

        for order in std::mem::take(&mut self.orders) {
            if !domain.is_legal_mutation(&order) {
                debug!(%order, "Illegal conversion skipped");
                report.skipped.push(order);
                continue;
            }

            let amount = order.amount.min(committed_max(domain, &order.from, &order.to));
            if amount == 0 {
                debug!(%order, "Conversion clamped to zero");
                report.skipped.push(order);
                continue;
            }

            let clamped = Conversion::new(order.from.clone(), order.to.clone(), amount);
            match domain.apply_mutation(&clamped) {
                Ok(()) => report.applied.push(clamped),
                Err(error) => {
                    warn!(%order, %error, "Conversion failed");
                    report.failed.push((order, error));
                }
            }
        }

        debug!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Conversions applied"
        );
        Ok(report)
    }

    fn position(&self, from: &EntityId, to: &EntityId) -> Option<usize> {
        self.orders
            .iter()
            .position(|o| &o.from == from && &o.to == to)
    }
}

/// Largest amount convertible against committed counts only
fn committed_max<D>(domain: &D, from: &EntityId, to: &EntityId) -> u32
where
    D: Rules + Roster + ?Sized,
{
    let mut max = domain.count_of(from);
    if domain.is_capacity_limited(to) {
        max = max.min(domain.capacity(to).saturating_sub(domain.count_of(to)));
        let cost_per = domain.cost_per_unit(from, to);
        if cost_per > 0 {
            max = max.min(u32::try_from(domain.budget() / cost_per).unwrap_or(u32::MAX));
        }
    }
    max
}

impl DebugState for ConversionLedger {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut section = DebugSection::new("Conversion Ledger").entry(
            "tracked_target",
            self.tracked_target
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".into()),
        );
        section.push_entry("pending_total_count", self.pending_total_count().to_string());
        for (i, order) in self.orders.iter().enumerate() {
            section.push_entry(format!("order[{i}]"), order.to_string());
        }
        vec![section]
    }
}
