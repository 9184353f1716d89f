// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::ValidationError;
use crate::models::{ActivityForm, Client, ClientForm};
use crate::utils::{is_valid_email, is_valid_phone};

fn blank(v: &Option<String>) -> bool {
    v.as_deref().map(str::trim).is_none_or(str::is_empty)
}

/// Checks a new-client form, collecting every problem rather than stopping at the first.
pub fn validate_client(form: &ClientForm) -> Result<(), ValidationError> {
    let mut fields = Vec::new();
    if blank(&form.first_name) {
        fields.push("first name".to_string());
    }
    if blank(&form.last_name) {
        fields.push("last name".to_string());
    }
    match form.email.as_deref().map(str::trim) {
        None | Some("") => fields.push("email".to_string()),
        Some(e) if !is_valid_email(e) => fields.push(format!("email (invalid: {})", e)),
        _ => {}
    }
    match form.phone.as_deref().map(str::trim) {
        None | Some("") => fields.push("phone".to_string()),
        Some(p) if !is_valid_phone(p) => fields.push(format!("phone (invalid: {})", p)),
        _ => {}
    }
    if blank(&form.address) {
        fields.push("address".to_string());
    }
    if form.initial_margin.is_some_and(|m| m.is_sign_negative()) {
        fields.push("initial margin (must not be negative)".to_string());
    }
    ValidationError::from_fields(fields)
}

/// Checks an activity form against its owning client.
pub fn validate_activity(form: &ActivityForm, client: &Client) -> Result<(), ValidationError> {
    let mut fields = Vec::new();
    if form.activity_type.is_none() {
        fields.push("type".to_string());
    }
    match form.amount {
        None => fields.push("amount".to_string()),
        Some(a) if a.is_zero() || a.is_sign_negative() => {
            fields.push("amount (must be positive)".to_string())
        }
        _ => {}
    }
    if blank(&form.fund) {
        fields.push("fund".to_string());
    }
    if form.time.is_none() {
        fields.push("time".to_string());
    }
    match form.recipient.as_deref().map(str::trim) {
        None | Some("") => fields.push("recipient".to_string()),
        Some(r) if !client.recipient_names().iter().any(|n| n == r) => {
            fields.push(format!("recipient ('{}' is not a name on this client)", r))
        }
        _ => {}
    }
    ValidationError::from_fields(fields)
}
