use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info};

use crate::decimal::Money;
use crate::errors::{InstallmentError, Result};
use crate::events::{Event, EventStore};
use crate::plan::InstallmentPlan;
use crate::store::BlobStore;
use crate::types::{PaymentOverrides, PlanId, PlanRequest};

/// fixed key the whole plan collection is stored under
pub const STORAGE_KEY: &str = "installment_plans";

/// installment lifecycle manager
///
/// Owns the blob store and performs every mutation as a
/// load-whole-collection, mutate, persist-whole-collection cycle. Mutating
/// operations take `&mut self`, so writers against one ledger instance are
/// serialized and the read-modify-write cycle cannot interleave.
pub struct InstallmentLedger<S: BlobStore> {
    store: S,
    events: EventStore,
}

impl<S: BlobStore> InstallmentLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            events: EventStore::new(),
        }
    }

    /// load the full plan collection
    pub(crate) fn load(&self) -> Result<Vec<InstallmentPlan>> {
        match self.store.get(STORAGE_KEY)? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(Vec::new()),
        }
    }

    /// persist the full plan collection
    pub(crate) fn persist(&self, plans: &[InstallmentPlan]) -> Result<()> {
        let blob = serde_json::to_string(plans)?;
        self.store.set(STORAGE_KEY, &blob)
    }

    /// create an installment plan and append it to the stored collection
    pub fn create(
        &mut self,
        request: PlanRequest,
        time: &SafeTimeProvider,
    ) -> Result<InstallmentPlan> {
        let now = time.now();
        let plan = InstallmentPlan::from_request(request, now)?;

        let mut plans = self.load()?;
        plans.push(plan.clone());
        self.persist(&plans)?;

        info!(
            plan_id = %plan.id,
            quotation_id = %plan.quotation_id,
            months = plan.installment_months,
            monthly_payment = %plan.monthly_payment,
            "installment plan created"
        );
        self.events.emit(Event::PlanCreated {
            plan_id: plan.id,
            quotation_id: plan.quotation_id.clone(),
            total_amount: plan.total_amount,
            installment_months: plan.installment_months,
            monthly_payment: plan.monthly_payment,
            timestamp: now,
        });

        Ok(plan)
    }

    /// record payment for one month of a plan
    ///
    /// Fails without touching the stored collection when the plan or month
    /// is missing, or when the month is already paid.
    pub fn record_payment(
        &mut self,
        id: PlanId,
        month: u32,
        overrides: PaymentOverrides,
        time: &SafeTimeProvider,
    ) -> Result<InstallmentPlan> {
        let now = time.now();
        let mut plans = self.load()?;

        let plan = plans
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(InstallmentError::InstallmentNotFound { id })?;

        plan.record_payment(month, overrides, now)?;
        let updated = plan.clone();
        self.persist(&plans)?;

        info!(
            plan_id = %updated.id,
            month,
            paid_months = updated.paid_months,
            remaining = %updated.remaining_amount,
            "payment recorded"
        );

        if let Some(entry) = updated.entry(month) {
            self.events.emit(Event::PaymentRecorded {
                plan_id: updated.id,
                month,
                paid_amount: entry.paid_amount.unwrap_or(entry.amount),
                paid_date: entry.paid_date.unwrap_or(now),
                remaining_amount: updated.remaining_amount,
            });
        }

        if updated.is_completed() {
            let total_paid: Money = updated
                .schedule
                .iter()
                .filter_map(|e| e.paid_amount)
                .sum();
            info!(plan_id = %updated.id, "installment plan completed");
            self.events.emit(Event::PlanCompleted {
                plan_id: updated.id,
                total_paid,
                timestamp: now,
            });
        }

        Ok(updated)
    }

    /// fetch a single plan by id
    pub fn get(&self, id: PlanId) -> Result<Option<InstallmentPlan>> {
        Ok(self.load()?.into_iter().find(|p| p.id == id))
    }

    /// all stored plans
    pub fn list(&self) -> Result<Vec<InstallmentPlan>> {
        self.load()
    }

    /// plans belonging to one customer
    pub fn list_by_customer(&self, customer_id: &str) -> Result<Vec<InstallmentPlan>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|p| p.customer_id == customer_id)
            .collect())
    }

    /// plans created for one quotation
    pub fn list_by_quotation(&self, quotation_id: &str) -> Result<Vec<InstallmentPlan>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|p| p.quotation_id == quotation_id)
            .collect())
    }

    /// remove every stored plan (testing/reset only)
    pub fn clear_all(&mut self, time: &SafeTimeProvider) -> Result<()> {
        let count = self.load()?.len();
        self.store.remove(STORAGE_KEY)?;
        debug!(count, "installment plans cleared");
        self.events.emit(Event::PlansCleared {
            count,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// drain events collected since the last call
    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventStore {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::store::MemoryStore;
    use crate::types::{EntryStatus, PlanStatus};
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn test_time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    fn request() -> PlanRequest {
        PlanRequest {
            quotation_id: "Q-1001".to_string(),
            customer_id: "C-42".to_string(),
            customer_name: "Nguyen Van A".to_string(),
            customer_phone: "0901234567".to_string(),
            vehicle_model: "VF 8 Plus".to_string(),
            total_amount: Money::from_major(120_000_000),
            installment_months: 12,
            interest_rate: Some(Rate::from_percentage(dec!(6))),
            start_date: None,
            created_by: None,
            dealer_id: None,
        }
    }

    #[test]
    fn test_create_persists_plan() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());

        let plan = ledger.create(request(), &time).unwrap();

        let stored = ledger.get(plan.id).unwrap().unwrap();
        assert_eq!(stored.monthly_payment, Money::from_major(10_300_000));
        assert_eq!(stored.start_date, time.now());
        assert_eq!(ledger.list().unwrap().len(), 1);

        let events = ledger.take_events();
        assert!(matches!(events[0], Event::PlanCreated { plan_id, .. } if plan_id == plan.id));
    }

    #[test]
    fn test_create_rejects_invalid_request() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());

        let mut bad = request();
        bad.installment_months = 0;
        assert!(ledger.create(bad, &time).is_err());
        assert!(ledger.list().unwrap().is_empty());
    }

    #[test]
    fn test_record_payment_round_trips_through_store() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        let plan = ledger.create(request(), &time).unwrap();

        let updated = ledger
            .record_payment(plan.id, 1, PaymentOverrides::default(), &time)
            .unwrap();
        assert_eq!(updated.paid_months, 1);
        assert_eq!(updated.remaining_amount, Money::from_major(110_000_000));

        let stored = ledger.get(plan.id).unwrap().unwrap();
        assert_eq!(stored.entry(1).unwrap().status, EntryStatus::Paid);
        assert_eq!(stored.paid_months, 1);
    }

    #[test]
    fn test_record_payment_unknown_plan() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        ledger.create(request(), &time).unwrap();

        let result = ledger.record_payment(Uuid::new_v4(), 1, PaymentOverrides::default(), &time);
        assert!(matches!(
            result,
            Err(InstallmentError::InstallmentNotFound { .. })
        ));
    }

    #[test]
    fn test_record_payment_unknown_month_leaves_store_unchanged() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        let plan = ledger.create(request(), &time).unwrap();

        let result = ledger.record_payment(plan.id, 13, PaymentOverrides::default(), &time);
        assert!(matches!(
            result,
            Err(InstallmentError::PaymentMonthNotFound { month: 13 })
        ));

        let stored = ledger.get(plan.id).unwrap().unwrap();
        assert_eq!(stored.paid_months, 0);
        assert!(stored.schedule.iter().all(|e| e.status == EntryStatus::Pending));
    }

    #[test]
    fn test_paying_every_month_completes_plan() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        let plan = ledger.create(request(), &time).unwrap();

        for month in 1..=12 {
            ledger
                .record_payment(plan.id, month, PaymentOverrides::default(), &time)
                .unwrap();
        }

        let stored = ledger.get(plan.id).unwrap().unwrap();
        assert_eq!(stored.status, PlanStatus::Completed);
        assert_eq!(stored.remaining_amount, Money::ZERO);

        let events = ledger.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PlanCompleted { plan_id, .. } if *plan_id == plan.id)));
    }

    #[test]
    fn test_list_by_customer_and_quotation() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        ledger.create(request(), &time).unwrap();

        let mut other = request();
        other.customer_id = "C-99".to_string();
        other.quotation_id = "Q-2002".to_string();
        ledger.create(other, &time).unwrap();

        assert_eq!(ledger.list_by_customer("C-42").unwrap().len(), 1);
        assert_eq!(ledger.list_by_customer("C-99").unwrap().len(), 1);
        assert_eq!(ledger.list_by_customer("C-0").unwrap().len(), 0);
        assert_eq!(ledger.list_by_quotation("Q-2002").unwrap().len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let time = test_time();
        let mut ledger = InstallmentLedger::new(MemoryStore::new());
        ledger.create(request(), &time).unwrap();
        ledger.create(request(), &time).unwrap();

        ledger.clear_all(&time).unwrap();
        assert!(ledger.list().unwrap().is_empty());

        let events = ledger.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PlansCleared { count: 2, .. })));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let time = test_time();
        let dir = tempfile::tempdir().unwrap();

        let plan_id = {
            let store = crate::store::FileStore::new(dir.path()).unwrap();
            let mut ledger = InstallmentLedger::new(store);
            ledger.create(request(), &time).unwrap().id
        };

        let store = crate::store::FileStore::new(dir.path()).unwrap();
        let ledger = InstallmentLedger::new(store);
        let stored = ledger.get(plan_id).unwrap().unwrap();
        assert_eq!(stored.installment_months, 12);
        assert_eq!(stored.monthly_payment, Money::from_major(10_300_000));
    }
}
