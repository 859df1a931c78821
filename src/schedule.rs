use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{InstallmentError, Result};
use crate::types::EntryStatus;

/// one month's obligation within an installment plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// 1-based month number, unique within the plan
    pub month: u32,
    pub due_date: DateTime<Utc>,
    /// amount due, identical across all entries under the flat-rate formula
    pub amount: Money,
    pub principal: Money,
    pub interest: Money,
    /// balance outstanding after this installment is paid
    pub remaining_balance: Money,
    pub status: EntryStatus,
    pub paid_date: Option<DateTime<Utc>>,
    pub paid_amount: Option<Money>,
}

impl ScheduleEntry {
    pub fn is_paid(&self) -> bool {
        self.status == EntryStatus::Paid
    }

    /// pending or overdue, i.e. still owed
    pub fn is_outstanding(&self) -> bool {
        matches!(self.status, EntryStatus::Pending | EntryStatus::Overdue)
    }
}

/// flat-rate payment schedule
///
/// Interest is approximated as `monthly_rate * months / 2` applied to the
/// whole principal, split evenly across the term. This is not a true
/// declining-balance amortization: every entry carries the same payment
/// amount and the same principal and interest portions; only the remaining
/// balance varies, decreasing linearly to zero at the final entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRateSchedule {
    pub monthly_payment: Money,
    pub total_payable: Money,
    pub interest_amount: Money,
    pub entries: Vec<ScheduleEntry>,
}

impl FlatRateSchedule {
    /// generate a schedule of exactly `months` entries
    ///
    /// Due dates are `start_date` plus N calendar months; when the start
    /// day does not exist in a target month the date clamps to that
    /// month's last day (the `chrono::Months` overflow rule).
    pub fn generate(
        total_amount: Money,
        months: u32,
        annual_rate: Rate,
        start_date: DateTime<Utc>,
    ) -> Result<Self> {
        if !total_amount.is_positive() {
            return Err(InstallmentError::InvalidAmount {
                amount: total_amount,
            });
        }
        if months == 0 {
            return Err(InstallmentError::InvalidTerm { months });
        }
        if annual_rate.is_negative() {
            return Err(InstallmentError::InvalidInterestRate { rate: annual_rate });
        }

        let months_dec = Decimal::from(months);
        let monthly_rate = annual_rate.monthly_rate().as_decimal();

        let flat_factor = Decimal::ONE + monthly_rate * months_dec / Decimal::from(2);
        let monthly_payment = (total_amount / months_dec) * flat_factor;
        let total_payable = monthly_payment * months_dec;
        let interest_amount = total_payable - total_amount;

        let principal = total_amount / months_dec;
        let interest = interest_amount / months_dec;

        let mut entries = Vec::with_capacity(months as usize);
        for month in 1..=months {
            let due_date = add_months(start_date, month)?;
            let remaining_balance =
                (total_amount - principal * Decimal::from(month)).max(Money::ZERO);

            entries.push(ScheduleEntry {
                month,
                due_date,
                amount: monthly_payment,
                principal,
                interest,
                remaining_balance,
                status: EntryStatus::Pending,
                paid_date: None,
                paid_amount: None,
            });
        }

        // fold any sub-unit division residue into the final entry so the
        // schedule always closes at a zero balance
        if let Some(last) = entries.last_mut() {
            if !last.remaining_balance.is_zero() && last.remaining_balance < Money::from_major(1) {
                last.principal += last.remaining_balance;
                last.remaining_balance = Money::ZERO;
            }
        }

        Ok(Self {
            monthly_payment,
            total_payable,
            interest_amount,
            entries,
        })
    }
}

/// add calendar months, clamping to the last day of shorter months
pub(crate) fn add_months(date: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| InstallmentError::InvalidDate {
            message: format!("cannot add {} months to {}", months, date),
        })
}
