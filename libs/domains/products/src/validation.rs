//! Payload validation.
//!
//! Pure and synchronous: every function here inspects a value and returns
//! either a [`Validated`] wrapper or the full, deterministically ordered list
//! of [`FieldViolation`]s.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Deref;

use axum_helpers::{FieldViolation, field_violations};
use validator::{Validate, ValidationError};

use crate::models::{CreateProduct, UpdateProduct};

pub const MAX_BATCH_SIZE: usize = 100;

/// A payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T>(T);

impl<T> Validated<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Validated<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

pub fn validate<T: Validate>(payload: T) -> Result<Validated<T>, Vec<FieldViolation>> {
    match payload.validate() {
        Ok(()) => Ok(Validated(payload)),
        Err(errors) => Err(field_violations(&errors)),
    }
}

/// Validate every item of a bulk payload.
///
/// Violations are reported for all items at once, with fields prefixed by the
/// item index (`[2].name`) and ordered by index, then field. A SKU repeated
/// within the batch is reported on every item after its first occurrence.
pub fn validate_batch(
    items: Vec<CreateProduct>,
) -> Result<Validated<Vec<CreateProduct>>, Vec<FieldViolation>> {
    if items.is_empty() {
        return Err(vec![FieldViolation::new(
            "items",
            "length",
            "must contain at least 1 item",
        )]);
    }
    if items.len() > MAX_BATCH_SIZE {
        return Err(vec![FieldViolation::new(
            "items",
            "length",
            format!("must contain at most {MAX_BATCH_SIZE} items"),
        )]);
    }

    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut violations = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let mut item_violations = match item.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => field_violations(&errors),
        };

        if let Some(sku) = item.sku.as_deref() {
            let first = *first_seen.entry(sku).or_insert(index);
            if first != index {
                item_violations.push(FieldViolation::new(
                    "sku",
                    "duplicate",
                    format!("repeats the SKU of item [{first}]"),
                ));
            }
        }

        item_violations.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));
        let prefix = format!("[{index}]");
        violations.extend(item_violations.into_iter().map(|v| v.prefixed(&prefix)));
    }

    if violations.is_empty() {
        Ok(Validated(items))
    } else {
        Err(violations)
    }
}

/// Validate a partial update; a patch that sets nothing is rejected.
pub fn validate_patch(patch: UpdateProduct) -> Result<Validated<UpdateProduct>, Vec<FieldViolation>> {
    if patch.is_empty() {
        return Err(vec![FieldViolation::new(
            "body",
            "empty",
            "at least one field must be provided",
        )]);
    }
    validate(patch)
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("must not be blank")));
    }
    Ok(())
}

pub(crate) fn finite(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new("finite").with_message(Cow::Borrowed("must be a finite number")));
    }
    Ok(())
}
