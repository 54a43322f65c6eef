use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the core after a committed mutation. Downstream
/// consumers (analytics, notifications) subscribe to the channel; the core
/// never reads back from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCompleted {
        order_id: Uuid,
        quantity_completed: Decimal,
    },
    OrderHeld {
        order_id: Uuid,
        reason: String,
    },
    OrderResumed {
        order_id: Uuid,
    },
    StepTransitioned {
        step_id: Uuid,
        order_id: Uuid,
        new_status: String,
    },
    MaterialConsumed {
        entry_id: Uuid,
        order_id: Uuid,
        part_id: Uuid,
        location_id: Uuid,
        qty: Decimal,
    },
    ConsumptionReversed {
        reversal_id: Uuid,
        original_id: Uuid,
        order_id: Uuid,
    },
    InventoryAdjusted {
        part_id: Uuid,
        location_id: Uuid,
        delta: Decimal,
        new_quantity: Decimal,
    },
    InventoryTransferred {
        part_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        qty: Decimal,
    },
    AllocationScheduled {
        allocation_id: Uuid,
        work_center_id: Uuid,
        order_id: Uuid,
        scheduled_start: DateTime<Utc>,
    },
    AllocationStatusChanged {
        allocation_id: Uuid,
        old_status: String,
        new_status: String,
    },
    AllocationDeleted {
        allocation_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Used after commit, where the mutation must not be reported as failed
    /// because a subscriber went away.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Default event loop: drains the channel and logs each event.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "event");
    }
}
