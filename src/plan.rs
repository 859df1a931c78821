use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{InstallmentError, Result};
use crate::schedule::{FlatRateSchedule, ScheduleEntry};
use crate::types::{default_interest_rate, EntryStatus, PaymentOverrides, PlanId, PlanRequest, PlanStatus};

/// one customer's financed vehicle purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentPlan {
    // identification
    pub id: PlanId,
    pub quotation_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub vehicle_model: String,

    // financial terms
    pub total_amount: Money,
    pub installment_months: u32,
    pub monthly_payment: Money,
    pub total_payable: Money,
    pub interest_rate: Rate,
    pub interest_amount: Money,

    // progress tracking
    pub status: PlanStatus,
    pub paid_months: u32,
    pub remaining_months: u32,
    pub remaining_amount: Money,

    // dates
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub last_payment_date: Option<DateTime<Utc>>,

    // schedule, one entry per month from 1 to installment_months
    pub schedule: Vec<ScheduleEntry>,

    // audit
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub dealer_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl InstallmentPlan {
    /// create a plan from a validated request
    pub fn from_request(request: PlanRequest, now: DateTime<Utc>) -> Result<Self> {
        request.validate()?;

        let interest_rate = request.interest_rate.unwrap_or_else(default_interest_rate);
        let start_date = request.start_date.unwrap_or(now);

        let schedule = FlatRateSchedule::generate(
            request.total_amount,
            request.installment_months,
            interest_rate,
            start_date,
        )?;

        let end_date = schedule
            .entries
            .last()
            .map(|e| e.due_date)
            .unwrap_or(start_date);
        let next_payment_date = schedule.entries.first().map(|e| e.due_date);

        Ok(Self {
            id: Uuid::new_v4(),
            quotation_id: request.quotation_id,
            customer_id: request.customer_id,
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            vehicle_model: request.vehicle_model,
            total_amount: request.total_amount,
            installment_months: request.installment_months,
            monthly_payment: schedule.monthly_payment,
            total_payable: schedule.total_payable,
            interest_rate,
            interest_amount: schedule.interest_amount,
            status: PlanStatus::Active,
            paid_months: 0,
            remaining_months: request.installment_months,
            remaining_amount: request.total_amount,
            start_date,
            end_date,
            next_payment_date,
            last_payment_date: None,
            schedule: schedule.entries,
            created_at: now,
            created_by: request.created_by,
            dealer_id: request.dealer_id,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == PlanStatus::Active
    }

    pub fn is_completed(&self) -> bool {
        self.status == PlanStatus::Completed
    }

    /// look up a schedule entry by month number
    pub fn entry(&self, month: u32) -> Option<&ScheduleEntry> {
        self.schedule.iter().find(|e| e.month == month)
    }

    /// earliest entry still pending
    pub fn first_pending(&self) -> Option<&ScheduleEntry> {
        self.schedule
            .iter()
            .find(|e| e.status == EntryStatus::Pending)
    }

    /// record payment for one month
    ///
    /// Marks the entry paid, then recomputes the aggregate fields from the
    /// entry states: paid-month count, remaining months, remaining amount
    /// (total minus the principal of every paid entry), next payment date
    /// (earliest entry still owed). Paying an already-paid month is
    /// rejected; an overdue entry may be paid directly.
    pub fn record_payment(
        &mut self,
        month: u32,
        overrides: PaymentOverrides,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let entry = self
            .schedule
            .iter_mut()
            .find(|e| e.month == month)
            .ok_or(InstallmentError::PaymentMonthNotFound { month })?;

        if entry.is_paid() {
            return Err(InstallmentError::AlreadyPaid { month });
        }

        let paid_date = overrides.paid_date.unwrap_or(now);
        entry.status = EntryStatus::Paid;
        entry.paid_date = Some(paid_date);
        entry.paid_amount = Some(overrides.paid_amount.unwrap_or(entry.amount));

        self.paid_months = self.schedule.iter().filter(|e| e.is_paid()).count() as u32;
        self.remaining_months = self.installment_months - self.paid_months;

        let paid_principal: Money = self
            .schedule
            .iter()
            .filter(|e| e.is_paid())
            .map(|e| e.principal)
            .sum();
        self.remaining_amount = (self.total_amount - paid_principal).max(Money::ZERO);

        self.last_payment_date = Some(paid_date);
        self.next_payment_date = self
            .schedule
            .iter()
            .filter(|e| e.is_outstanding())
            .map(|e| e.due_date)
            .min();

        if self.paid_months == self.installment_months {
            self.status = PlanStatus::Completed;
            self.remaining_amount = Money::ZERO;
            self.remaining_months = 0;
        }

        self.updated_at = now;
        Ok(())
    }

    /// months of pending entries whose due date has passed
    ///
    /// Pure classification; entries already overdue or paid are excluded.
    pub fn classify_overdue(&self, now: DateTime<Utc>) -> Vec<u32> {
        self.schedule
            .iter()
            .filter(|e| e.status == EntryStatus::Pending && e.due_date < now)
            .map(|e| e.month)
            .collect()
    }

    /// flip past-due pending entries to overdue, returning the months changed
    pub fn apply_overdue_transitions(&mut self, now: DateTime<Utc>) -> Vec<u32> {
        let months = self.classify_overdue(now);
        if months.is_empty() {
            return months;
        }

        for entry in &mut self.schedule {
            if months.contains(&entry.month) {
                entry.status = EntryStatus::Overdue;
            }
        }
        self.updated_at = now;
        months
    }
}
