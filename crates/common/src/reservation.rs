//! Records of stock decrements made on behalf of an order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProductId, ReservationId};

/// One product decrement inside a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl ReservationLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Exactly which stock decrements were applied, so they can be reversed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub lines: Vec<ReservationLine>,
    pub created_at: DateTime<Utc>,
    /// Set when the decrements have been credited back.
    pub released_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Creates a new active reservation.
    pub fn new(lines: Vec<ReservationLine>) -> Self {
        Self {
            id: ReservationId::new(),
            lines,
            created_at: Utc::now(),
            released_at: None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released_at.is_some()
    }
}
