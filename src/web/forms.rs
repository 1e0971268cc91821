//! Posted-form helpers: field access, validation messages, date parsing,
//! and the reservation draft carried between guest pages.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use validator::ValidateEmail;

use crate::model::{Day, GuestDetails};

/// Session key of the guest's in-progress reservation.
pub const DRAFT_KEY: &str = "reservation";

/// A reservation being put together across the search, choose and book pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDraft {
    pub start: Day,
    pub end: Day,
    pub room_id: Option<Ulid>,
    pub room_name: Option<String>,
    #[serde(default)]
    pub guest: GuestDetails,
    /// Set once the reservation has been stored.
    pub reservation_id: Option<Ulid>,
}

impl ReservationDraft {
    pub fn new(start: Day, end: Day) -> Self {
        Self {
            start,
            end,
            room_id: None,
            room_name: None,
            guest: GuestDetails::default(),
            reservation_id: None,
        }
    }
}

/// Accepts `YYYY-MM-DD` (date inputs) and `DD/MM/YYYY` (typed dates).
pub fn parse_day(value: &str) -> Option<Day> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}

/// Validation messages per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// First message for the field, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|m| m.first()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Posted fields plus the errors found while checking them.
#[derive(Debug, Clone, Default)]
pub struct Form {
    values: HashMap<String, String>,
    pub errors: FormErrors,
}

impl Form {
    /// Later duplicates of a field name are ignored.
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        let mut values = HashMap::new();
        for (k, v) in pairs {
            values.entry(k).or_insert(v);
        }
        Self {
            values,
            errors: FormErrors::default(),
        }
    }

    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn required(&mut self, fields: &[&str]) {
        for field in fields {
            if self.get(field).trim().is_empty() {
                self.errors.add(field, "This field is required");
            }
        }
    }

    pub fn min_length(&mut self, field: &str, length: usize) -> bool {
        if self.get(field).trim().chars().count() < length {
            self.errors
                .add(field, format!("This field must be at least {length} characters long"));
            return false;
        }
        true
    }

    pub fn is_email(&mut self, field: &str) {
        if !self.get(field).trim().validate_email() {
            self.errors.add(field, "Please enter a valid email address");
        }
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Guest contact fields, trimmed.
    pub fn guest_details(&self) -> GuestDetails {
        GuestDetails {
            first_name: self.get("first_name").trim().to_string(),
            last_name: self.get("last_name").trim().to_string(),
            email: self.get("email").trim().to_string(),
            phone: self.get("phone").trim().to_string(),
        }
    }
}

/// Checks shared by the guest booking form and the admin edit form.
pub fn validate_guest_form(form: &mut Form) {
    form.required(&["first_name", "last_name", "email"]);
    form.min_length("first_name", 2);
    form.is_email("email");
}
