use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{InstallmentError, Result};

/// unique identifier for an installment plan
pub type PlanId = Uuid;

/// default annual interest rate applied when a request leaves it unset
pub fn default_interest_rate() -> Rate {
    Rate::from_percentage(dec!(6))
}

/// installment plan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    /// payments outstanding
    Active,
    /// every scheduled month paid
    Completed,
    /// written off after non-payment
    Defaulted,
    /// cancelled before completion
    Cancelled,
}

/// schedule entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// due but not yet paid
    Pending,
    /// payment recorded
    Paid,
    /// past due date and still unpaid
    Overdue,
}

/// request to open an installment plan for a financed vehicle purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub quotation_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub vehicle_model: String,
    pub total_amount: Money,
    pub installment_months: u32,
    /// annual rate; defaults to 6% when unset
    pub interest_rate: Option<Rate>,
    /// defaults to the current time when unset
    pub start_date: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub dealer_id: Option<String>,
}

impl PlanRequest {
    /// validate financial terms before schedule generation
    pub fn validate(&self) -> Result<()> {
        if !self.total_amount.is_positive() {
            return Err(InstallmentError::InvalidAmount {
                amount: self.total_amount,
            });
        }

        if self.installment_months == 0 {
            return Err(InstallmentError::InvalidTerm {
                months: self.installment_months,
            });
        }

        if let Some(rate) = self.interest_rate {
            if rate.is_negative() {
                return Err(InstallmentError::InvalidInterestRate { rate });
            }
        }

        Ok(())
    }
}

/// optional overrides when recording a payment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentOverrides {
    /// defaults to the entry's amount due
    pub paid_amount: Option<Money>,
    /// defaults to the current time
    pub paid_date: Option<DateTime<Utc>>,
}
