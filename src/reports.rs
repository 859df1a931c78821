use chrono::{DateTime, Duration, Utc};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::decimal::Money;
use crate::errors::Result;
use crate::events::Event;
use crate::ledger::InstallmentLedger;
use crate::store::BlobStore;
use crate::types::{PlanId, PlanStatus};

/// upcoming-window used by the statistics aggregate
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// one plan's next payment falling due soon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingPayment {
    pub plan_id: PlanId,
    pub quotation_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub vehicle_model: String,
    pub month: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Money,
    pub days_until_due: i64,
}

/// a schedule entry that has gone past its due date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverduePayment {
    pub plan_id: PlanId,
    pub quotation_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub vehicle_model: String,
    pub month: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Money,
    pub days_overdue: i64,
}

/// ledger-wide aggregate figures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStatistics {
    pub total_plans: usize,
    pub active_plans: usize,
    pub completed_plans: usize,
    pub defaulted_plans: usize,
    pub cancelled_plans: usize,
    pub overdue_count: usize,
    pub upcoming_count: usize,
    /// sum of total financed amounts across active plans
    pub total_financed: Money,
    /// principal collected across active plans
    pub total_collected: Money,
    /// principal outstanding across active plans
    pub total_outstanding: Money,
    /// collected / financed as a percentage, 0 when nothing is financed
    pub collection_rate: Decimal,
}

/// whole days between two instants, rounded up
fn days_between_ceil(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let secs = (to - from).num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + 86_399) / 86_400
    }
}

impl<S: BlobStore> InstallmentLedger<S> {
    /// next payments due within `days_ahead` days
    ///
    /// Takes each active plan's earliest pending entry and keeps it when
    /// its due date falls inside `[now, now + days_ahead]` inclusive.
    /// Sorted by due date ascending. Does not mutate storage.
    pub fn upcoming_payments(
        &self,
        days_ahead: i64,
        time: &SafeTimeProvider,
    ) -> Result<Vec<UpcomingPayment>> {
        let now = time.now();
        let horizon = now + Duration::days(days_ahead);

        let mut upcoming: Vec<UpcomingPayment> = self
            .load()?
            .into_iter()
            .filter(|p| p.is_active())
            .filter_map(|plan| {
                let entry = plan.first_pending()?;
                if entry.due_date < now || entry.due_date > horizon {
                    return None;
                }
                Some(UpcomingPayment {
                    plan_id: plan.id,
                    quotation_id: plan.quotation_id.clone(),
                    customer_id: plan.customer_id.clone(),
                    customer_name: plan.customer_name.clone(),
                    customer_phone: plan.customer_phone.clone(),
                    vehicle_model: plan.vehicle_model.clone(),
                    month: entry.month,
                    due_date: entry.due_date,
                    amount: entry.amount,
                    days_until_due: days_between_ceil(now, entry.due_date),
                })
            })
            .collect();

        upcoming.sort_by_key(|u| u.due_date);
        Ok(upcoming)
    }

    /// advance past-due pending entries to overdue and report them
    ///
    /// This is the command side of overdue detection: entries flip from
    /// pending to overdue here and nowhere else, and the mutated collection
    /// is persisted when anything changed. Entries already overdue are not
    /// reported again. Sorted by days overdue descending.
    pub fn overdue_payments(&mut self, time: &SafeTimeProvider) -> Result<Vec<OverduePayment>> {
        let now = time.now();
        let mut plans = self.load()?;
        let mut overdue = Vec::new();
        let mut changed = false;

        for plan in plans.iter_mut().filter(|p| p.is_active()) {
            let flipped = plan.apply_overdue_transitions(now);
            if flipped.is_empty() {
                continue;
            }
            changed = true;

            for month in flipped {
                let Some(entry) = plan.entry(month) else {
                    continue;
                };
                let days_overdue = days_between_ceil(entry.due_date, now);
                warn!(
                    plan_id = %plan.id,
                    month,
                    days_overdue,
                    "installment payment overdue"
                );
                self.events_mut().emit(Event::PaymentOverdue {
                    plan_id: plan.id,
                    month,
                    due_date: entry.due_date,
                    days_overdue,
                });
                overdue.push(OverduePayment {
                    plan_id: plan.id,
                    quotation_id: plan.quotation_id.clone(),
                    customer_id: plan.customer_id.clone(),
                    customer_name: plan.customer_name.clone(),
                    customer_phone: plan.customer_phone.clone(),
                    vehicle_model: plan.vehicle_model.clone(),
                    month,
                    due_date: entry.due_date,
                    amount: entry.amount,
                    days_overdue,
                });
            }
        }

        if changed {
            self.persist(&plans)?;
        }

        overdue.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));
        Ok(overdue)
    }

    /// aggregate figures across the whole ledger
    ///
    /// Runs the overdue scan first, so the counts reflect the stored state
    /// after transitions have been applied.
    pub fn statistics(&mut self, time: &SafeTimeProvider) -> Result<LedgerStatistics> {
        let overdue_count = self.overdue_payments(time)?.len();
        let upcoming_count = self.upcoming_payments(UPCOMING_WINDOW_DAYS, time)?.len();

        let plans = self.load()?;
        let mut stats = LedgerStatistics {
            total_plans: plans.len(),
            active_plans: 0,
            completed_plans: 0,
            defaulted_plans: 0,
            cancelled_plans: 0,
            overdue_count,
            upcoming_count,
            total_financed: Money::ZERO,
            total_collected: Money::ZERO,
            total_outstanding: Money::ZERO,
            collection_rate: Decimal::ZERO,
        };

        for plan in &plans {
            match plan.status {
                PlanStatus::Active => stats.active_plans += 1,
                PlanStatus::Completed => stats.completed_plans += 1,
                PlanStatus::Defaulted => stats.defaulted_plans += 1,
                PlanStatus::Cancelled => stats.cancelled_plans += 1,
            }

            if plan.is_active() {
                stats.total_financed += plan.total_amount;
                stats.total_collected += plan.total_amount - plan.remaining_amount;
                stats.total_outstanding += plan.remaining_amount;
            }
        }

        if !stats.total_financed.is_zero() {
            stats.collection_rate = (stats.total_collected.as_decimal()
                / stats.total_financed.as_decimal()
                * Decimal::from(100))
            .round_dp(2);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::store::MemoryStore;
    use crate::types::{EntryStatus, PaymentOverrides, PlanRequest};
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    fn test_time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    fn request(quotation: &str, months: u32) -> PlanRequest {
        PlanRequest {
            quotation_id: quotation.to_string(),
            customer_id: "C-42".to_string(),
            customer_name: "Nguyen Van A".to_string(),
            customer_phone: "0901234567".to_string(),
            vehicle_model: "VF 8 Plus".to_string(),
            total_amount: Money::from_major(120_000_000),
            installment_months: months,
            interest_rate: Some(Rate::from_percentage(dec!(6))),
            start_date: None,
            created_by: None,
            dealer_id: None,
        }
    }

    #[test]
    fn test_upcoming_window_is_inclusive() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        ledger.create(request("Q-1", 12), &time).unwrap();

        // first due date is Feb 1, 31 days out
        assert!(ledger.upcoming_payments(7, &time).unwrap().is_empty());
        assert!(ledger.upcoming_payments(30, &time).unwrap().is_empty());

        let within = ledger.upcoming_payments(31, &time).unwrap();
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].month, 1);
        assert_eq!(within[0].days_until_due, 31);
        assert_eq!(within[0].amount, Money::from_major(10_300_000));
    }

    #[test]
    fn test_upcoming_skips_paid_and_inactive() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        let plan = ledger.create(request("Q-1", 2), &time).unwrap();

        // pay the first month; the second is ~2 months out
        ledger
            .record_payment(plan.id, 1, PaymentOverrides::default(), &time)
            .unwrap();
        let upcoming = ledger.upcoming_payments(90, &time).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].month, 2);

        // complete the plan; nothing is upcoming anymore
        ledger
            .record_payment(plan.id, 2, PaymentOverrides::default(), &time)
            .unwrap();
        assert!(ledger.upcoming_payments(90, &time).unwrap().is_empty());
    }

    #[test]
    fn test_upcoming_sorted_by_due_date() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        let early = ledger.create(request("Q-1", 12), &time).unwrap();

        let mut later = request("Q-2", 12);
        later.start_date = Some(time.now() + Duration::days(10));
        let late = ledger.create(later, &time).unwrap();

        let upcoming = ledger.upcoming_payments(60, &time).unwrap();
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].plan_id, early.id);
        assert_eq!(upcoming[1].plan_id, late.id);
    }

    #[test]
    fn test_overdue_scan_flips_and_persists() {
        let time = test_time();
        let controller = time.test_control().unwrap();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        let plan = ledger.create(request("Q-1", 12), &time).unwrap();

        // nothing due yet
        assert!(ledger.overdue_payments(&time).unwrap().is_empty());

        // move past the first two due dates
        controller.advance(Duration::days(75));
        let overdue = ledger.overdue_payments(&time).unwrap();
        assert_eq!(overdue.len(), 2);
        // sorted by days overdue descending, month 1 first
        assert_eq!(overdue[0].month, 1);
        assert!(overdue[0].days_overdue > overdue[1].days_overdue);

        // the flip reached the store
        let stored = ledger.get(plan.id).unwrap().unwrap();
        assert_eq!(stored.entry(1).unwrap().status, EntryStatus::Overdue);
        assert_eq!(stored.entry(2).unwrap().status, EntryStatus::Overdue);
        assert_eq!(stored.entry(3).unwrap().status, EntryStatus::Pending);

        // a second scan reports nothing new
        assert!(ledger.overdue_payments(&time).unwrap().is_empty());

        let events = ledger.take_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::PaymentOverdue { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_statistics_empty_ledger() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());

        let stats = ledger.statistics(&time).unwrap();
        assert_eq!(stats.total_plans, 0);
        assert_eq!(stats.collection_rate, Decimal::ZERO);
    }

    #[test]
    fn test_statistics_aggregates_active_plans() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        let plan = ledger.create(request("Q-1", 12), &time).unwrap();
        ledger
            .record_payment(plan.id, 1, PaymentOverrides::default(), &time)
            .unwrap();

        // second plan fully paid, leaves the active pool
        let done = ledger.create(request("Q-2", 2), &time).unwrap();
        for month in 1..=2 {
            ledger
                .record_payment(done.id, month, PaymentOverrides::default(), &time)
                .unwrap();
        }

        let stats = ledger.statistics(&time).unwrap();
        assert_eq!(stats.total_plans, 2);
        assert_eq!(stats.active_plans, 1);
        assert_eq!(stats.completed_plans, 1);
        assert_eq!(stats.total_financed, Money::from_major(120_000_000));
        assert_eq!(stats.total_collected, Money::from_major(10_000_000));
        assert_eq!(stats.total_outstanding, Money::from_major(110_000_000));
        assert_eq!(stats.collection_rate, dec!(8.33));
    }

    #[test]
    fn test_days_between_ceil() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(days_between_ceil(from, from), 0);
        assert_eq!(days_between_ceil(from, from + Duration::hours(1)), 1);
        assert_eq!(days_between_ceil(from, from + Duration::days(1)), 1);
        assert_eq!(
            days_between_ceil(from, from + Duration::days(1) + Duration::hours(1)),
            2
        );
        // past dates never report negative days
        assert_eq!(days_between_ceil(from, from - Duration::days(3)), 0);
    }
}
