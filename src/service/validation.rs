//! Input validation
//!
//! Field rules for user input. Create and update differ only in which
//! service-owned fields must be absent or present.

use super::credentials::PasswordPolicy;
use super::errors::{ServiceError, ServiceResult};
use crate::model::UserInput;

const MAX_FIELD_LEN: usize = 255;

pub fn validate_for_create(input: &UserInput, policy: &PasswordPolicy) -> ServiceResult<()> {
    validate_fields(input)?;

    if input.id.as_deref().is_some_and(|id| !id.is_empty()) {
        return Err(ServiceError::invalid(
            "id is filled by the service and shouldn't be filled",
        ));
    }
    if input.created_at.is_some() {
        return Err(ServiceError::invalid(
            "created_at is filled by the service and shouldn't be filled",
        ));
    }
    if input.updated_at.is_some() {
        return Err(ServiceError::invalid(
            "updated_at is filled by the service and shouldn't be filled",
        ));
    }

    match input.password.as_deref() {
        Some(password) => policy.validate(password),
        None => Err(ServiceError::invalid("password should be set")),
    }
}

pub fn validate_for_update(input: &UserInput, policy: &PasswordPolicy) -> ServiceResult<()> {
    validate_fields(input)?;

    if input.created_at.is_none() {
        return Err(ServiceError::invalid("created_at should be provided"));
    }
    if input.updated_at.is_none() {
        return Err(ServiceError::invalid("updated_at should be provided"));
    }

    match input.password.as_deref() {
        Some(password) if !password.is_empty() => policy.validate(password),
        _ => Ok(()),
    }
}

fn validate_fields(input: &UserInput) -> ServiceResult<()> {
    check_length("first_name", &input.first_name)?;
    check_length("last_name", &input.last_name)?;
    check_length("name", &input.name)?;
    check_length("email", &input.email)?;

    let country_len = input.country.len();
    if country_len != 2 {
        return Err(ServiceError::invalid(format!(
            "country should be exactly 2 bytes, got {country_len}"
        )));
    }

    if input.password_hash.as_deref().is_some_and(|h| !h.is_empty()) {
        return Err(ServiceError::invalid(
            "password_hash should be empty as it's set by the service",
        ));
    }

    Ok(())
}

fn check_length(field: &str, value: &str) -> ServiceResult<()> {
    if value.is_empty() || value.len() > MAX_FIELD_LEN {
        return Err(ServiceError::invalid(format!(
            "{field} should have between 1 and {MAX_FIELD_LEN} characters, provided {}",
            value.len()
        )));
    }
    Ok(())
}
