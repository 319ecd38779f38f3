use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Booking lifecycle status. The legal transitions live in `next_states`,
/// which every transition path consults — handlers never hardcode edges.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// The closed transition table:
    /// pending → accepted | rejected | cancelled,
    /// accepted → in_progress | cancelled,
    /// in_progress → completed.
    pub fn next_states(self) -> &'static [BookingStatus] {
        match self {
            BookingStatus::Pending => &[
                BookingStatus::Accepted,
                BookingStatus::Rejected,
                BookingStatus::Cancelled,
            ],
            BookingStatus::Accepted => &[BookingStatus::InProgress, BookingStatus::Cancelled],
            BookingStatus::InProgress => &[BookingStatus::Completed],
            BookingStatus::Rejected | BookingStatus::Completed | BookingStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        self.next_states().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.next_states().is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "booking_urgency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Medium,
    High,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// One line of the inventory snapshot embedded in a booking. Copied from the
/// catalog at creation time; later catalog edits never touch past bookings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct InventoryLine {
    pub inventory_id: i32,
    pub name: String,
    #[schema(value_type = String)]
    pub unit_price: BigDecimal,
    pub quantity: i32,
}

impl InventoryLine {
    pub fn line_total(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

/// Estimated cost at booking time: service base price plus the snapshot lines.
pub fn estimate_cost(base_price: &BigDecimal, lines: &[InventoryLine]) -> BigDecimal {
    lines
        .iter()
        .fold(base_price.clone(), |acc, line| acc + line.line_total())
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: i32,
    pub house_owner_id: i32,
    pub service_id: i32,
    pub technician_id: Option<i32>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub status: BookingStatus,
    pub urgency: Urgency,
    pub address: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub estimated_cost: BigDecimal,
    #[schema(value_type = Vec<InventoryLine>)]
    pub selected_inventory: Json<Vec<InventoryLine>>,
    pub payment_method: Option<String>,
    pub payment_status: PaymentStatus,
    pub completion_notes: Option<String>,
    pub accepted_at: Option<NaiveDateTime>,
    pub started_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Items the house owner picked when creating the booking; the server turns
/// these into the denormalized snapshot.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectedItem {
    pub inventory_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewBooking {
    pub service_id: i32,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub urgency: Option<Urgency>,
    pub address: String,
    pub description: Option<String>,
    #[serde(default)]
    pub selected_items: Vec<SelectedItem>,
    pub payment_method: Option<String>,
}

/// Partial update, only honored while the booking is still pending.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBooking {
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub urgency: Option<Urgency>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status: BookingStatus,
    pub completion_notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTechnician {
    pub technician_id: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Deserialize, Default, IntoParams)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub urgency: Option<Urgency>,
    pub technician_id: Option<i32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn pending_allows_accept_reject_cancel_only() {
        let next = BookingStatus::Pending.next_states();
        assert_eq!(next.len(), 3);
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Accepted));
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Rejected));
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::InProgress));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Completed));
    }

    #[test]
    fn accepted_allows_start_or_cancel_only() {
        assert!(BookingStatus::Accepted.can_transition_to(BookingStatus::InProgress));
        assert!(BookingStatus::Accepted.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Accepted.can_transition_to(BookingStatus::Rejected));
        assert!(!BookingStatus::Accepted.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Accepted.can_transition_to(BookingStatus::Pending));
    }

    #[test]
    fn in_progress_only_completes() {
        assert_eq!(
            BookingStatus::InProgress.next_states(),
            &[BookingStatus::Completed]
        );
        assert!(!BookingStatus::InProgress.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in [
            BookingStatus::Rejected,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            assert!(status.next_states().is_empty());
        }
        assert!(!BookingStatus::Pending.is_terminal());
    }

    #[test]
    fn no_transition_is_self_referential() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Accepted,
            BookingStatus::Rejected,
            BookingStatus::InProgress,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn cost_estimate_sums_base_price_and_lines() {
        let base = BigDecimal::from_str("50.00").unwrap();
        let lines = vec![
            InventoryLine {
                inventory_id: 1,
                name: "PVC pipe".into(),
                unit_price: BigDecimal::from_str("12.50").unwrap(),
                quantity: 2,
            },
            InventoryLine {
                inventory_id: 2,
                name: "Sealant".into(),
                unit_price: BigDecimal::from_str("7.25").unwrap(),
                quantity: 1,
            },
        ];
        assert_eq!(
            estimate_cost(&base, &lines),
            BigDecimal::from_str("82.25").unwrap()
        );
    }

    #[test]
    fn cost_estimate_without_items_is_base_price() {
        let base = BigDecimal::from_str("99.99").unwrap();
        assert_eq!(estimate_cost(&base, &[]), base);
    }
}
