use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::PlanId;

/// all events emitted by ledger operations
///
/// Collaborators that react to payment activity (customer management,
/// notifications) consume these instead of being called directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    PlanCreated {
        plan_id: PlanId,
        quotation_id: String,
        total_amount: Money,
        installment_months: u32,
        monthly_payment: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentRecorded {
        plan_id: PlanId,
        month: u32,
        paid_amount: Money,
        paid_date: DateTime<Utc>,
        remaining_amount: Money,
    },
    PlanCompleted {
        plan_id: PlanId,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentOverdue {
        plan_id: PlanId,
        month: u32,
        due_date: DateTime<Utc>,
        days_overdue: i64,
    },
    PlansCleared {
        count: usize,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
