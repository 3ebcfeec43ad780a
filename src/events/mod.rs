use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{bill::BillType, booking::BookingStatus, subscription::PlanTier};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the processor is gone.
    /// Domain writes have already committed by the time events are emitted.
    pub async fn emit(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Things that happened in the shop worth recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CustomerCreated(Uuid),
    CustomerDeleted(Uuid),

    ProductCreated(Uuid),
    ProductDeactivated(Uuid),
    ProductRestocked {
        product_id: Uuid,
        quantity: i32,
        new_quantity: i32,
    },
    StockAdjusted {
        product_id: Uuid,
        quantity_change: i32,
        new_quantity: i32,
    },
    StockLow {
        product_id: Uuid,
        name: String,
        stock_quantity: i32,
        min_stock_level: i32,
    },

    BillCreated {
        bill_id: Uuid,
        bill_type: BillType,
        serial_no: i64,
        total: Decimal,
    },
    PaymentRecorded {
        bill_id: Uuid,
        amount: Decimal,
    },
    BillVoided {
        bill_id: Uuid,
        bill_type: BillType,
        serial_no: i64,
    },
    RentalReturned(Uuid),

    BookingCreated {
        booking_id: Uuid,
        start_at: DateTime<Utc>,
    },
    BookingStatusChanged {
        booking_id: Uuid,
        status: BookingStatus,
    },

    PlanChanged {
        from: PlanTier,
        to: PlanTier,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::CustomerCreated(_) => "customer_created",
            Event::CustomerDeleted(_) => "customer_deleted",
            Event::ProductCreated(_) => "product_created",
            Event::ProductDeactivated(_) => "product_deactivated",
            Event::ProductRestocked { .. } => "product_restocked",
            Event::StockAdjusted { .. } => "stock_adjusted",
            Event::StockLow { .. } => "stock_low",
            Event::BillCreated { .. } => "bill_created",
            Event::PaymentRecorded { .. } => "payment_recorded",
            Event::BillVoided { .. } => "bill_voided",
            Event::RentalReturned(_) => "rental_returned",
            Event::BookingCreated { .. } => "booking_created",
            Event::BookingStatusChanged { .. } => "booking_status_changed",
            Event::PlanChanged { .. } => "plan_changed",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("shopdesk.events.total", 1, "event" => event.name());

        match &event {
            Event::StockLow {
                product_id,
                name,
                stock_quantity,
                min_stock_level,
            } => {
                warn!(
                    %product_id,
                    product = %name,
                    stock_quantity,
                    min_stock_level,
                    "Product is at or below its minimum stock level"
                );
            }
            Event::BillCreated {
                bill_id,
                bill_type,
                serial_no,
                total,
            } => {
                info!(
                    %bill_id,
                    bill_type = bill_type.as_str(),
                    serial_no,
                    %total,
                    "Bill created"
                );
            }
            Event::PlanChanged { from, to } => {
                info!(from = ?from, to = ?to, "Subscription plan changed");
            }
            other => {
                info!(event = other.name(), payload = ?other, "Domain event");
            }
        }
    }

    info!("Event channel closed; event processing stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn processor_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(process_events(rx));

        let sender = EventSender::new(tx);
        sender.emit(Event::CustomerCreated(Uuid::new_v4())).await;
        sender
            .emit(Event::StockLow {
                product_id: Uuid::new_v4(),
                name: "Chair".into(),
                stock_quantity: 1,
                min_stock_level: 5,
            })
            .await;
        drop(sender);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::RentalReturned(Uuid::new_v4())).await.is_err());
        // emit only logs
        sender.emit(Event::RentalReturned(Uuid::new_v4())).await;
    }
}
