use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clinic patient. CPF is stored as an opaque unique identifier; digit
/// validation belongs to the registration layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub cpf: String,
    pub birth_date: Option<NaiveDate>,
}
