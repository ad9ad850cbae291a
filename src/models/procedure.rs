use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookable procedure from the clinic catalog. Duration drives slot layout
/// and conflict intervals; price is exact integer cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub duration_minutes: i64,
}
