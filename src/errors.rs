use thiserror::Error;

use crate::decimal::{Money, Rate};
use crate::types::PlanId;

#[derive(Error, Debug)]
pub enum InstallmentError {
    #[error("installment not found: {id}")]
    InstallmentNotFound {
        id: PlanId,
    },

    #[error("payment month not found: {month}")]
    PaymentMonthNotFound {
        month: u32,
    },

    #[error("payment already recorded for month {month}")]
    AlreadyPaid {
        month: u32,
    },

    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("invalid term: {months} months")]
    InvalidTerm {
        months: u32,
    },

    #[error("invalid interest rate: {rate}")]
    InvalidInterestRate {
        rate: Rate,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("storage error: {source}")]
    Storage {
        #[from]
        source: std::io::Error,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, InstallmentError>;
