//! Checkout saga aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, DomainError, OrderNumber, OwnerId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::catalog::Reservation;
use crate::events::SagaEvent;
use crate::state::SagaState;

/// Event-sourced journal of one checkout run.
///
/// Tracks the steps taken, the reservations held and the order committed, so
/// a run can be inspected after the fact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSaga {
    id: Option<AggregateId>,
    version: Version,
    owner_id: Option<OwnerId>,
    cart_id: Option<AggregateId>,
    cart_version: Version,
    state: SagaState,
    current_step: Option<String>,
    completed_steps: Vec<String>,
    reservations: Vec<Reservation>,
    order_id: Option<AggregateId>,
    order_number: Option<OrderNumber>,
    compensation_failures: Vec<String>,
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Aggregate for CheckoutSaga {
    type Event = SagaEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "CheckoutSaga"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.owner_id = Some(data.owner_id);
                self.cart_id = Some(data.cart_id);
                self.cart_version = data.cart_version;
                self.state = SagaState::Running;
                self.started_at = Some(data.started_at);
            }
            SagaEvent::StepStarted(data) => {
                self.current_step = Some(data.step_name);
            }
            SagaEvent::StockReserved(reservation) => {
                self.reservations.push(reservation);
            }
            SagaEvent::StepCompleted(data) => {
                self.current_step = None;
                self.completed_steps.push(data.step_name);
            }
            SagaEvent::StepFailed(data) => {
                self.failure_reason = Some(data.error);
            }
            SagaEvent::OrderCommitted(data) => {
                self.order_id = Some(data.order_id);
                self.order_number = Some(data.order_number);
            }
            SagaEvent::CompensationStarted(_) => {
                self.state = SagaState::Compensating;
            }
            SagaEvent::CompensationStepCompleted(_) => {}
            SagaEvent::CompensationStepFailed(data) => {
                self.compensation_failures
                    .push(format!("{}: {}", data.step_name, data.error));
            }
            SagaEvent::SagaCompleted(data) => {
                self.state = SagaState::Completed;
                self.order_id = Some(data.order_id);
                self.finished_at = Some(data.completed_at);
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(data.reason);
                self.finished_at = Some(data.failed_at);
            }
        }
    }
}

// Query methods
impl CheckoutSaga {
    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id
    }

    pub fn cart_id(&self) -> Option<AggregateId> {
        self.cart_id
    }

    /// Cart version the run validated against.
    pub fn cart_version(&self) -> Version {
        self.cart_version
    }

    /// The step in flight, if one was started and has not completed.
    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Reservations taken by this run, in the order they were taken.
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn compensation_failures(&self) -> &[String] {
        &self.compensation_failures
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}
