use std::borrow::Cow;

use rust_decimal::Decimal;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::job_offer::{ContractType, OfferStatus};
use crate::models::user::Role;

pub fn validate<T: Validate>(val: &T) -> Result<(), ValidationErrors> {
    val.validate()
}

/// Runs the derived rules, then lets the caller add cross-field checks to the
/// same error map so one response carries every failure.
pub fn validate_with<T, F>(val: &T, extra: F) -> Result<(), ValidationErrors>
where
    T: Validate,
    F: FnOnce(&mut ValidationErrors),
{
    let mut errors = match val.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    };
    extra(&mut errors);
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn invalid(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn field_error(
    field: &'static str,
    code: &'static str,
    message: impl Into<Cow<'static, str>>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(field, invalid(code, message));
    errors
}

pub fn salary_range_error(min: Option<Decimal>, max: Option<Decimal>) -> Option<ValidationError> {
    match (min, max) {
        (Some(min), Some(max)) if max < min => Some(invalid(
            "gte",
            "The salary max must be greater than or equal to salary min.",
        )),
        _ => None,
    }
}

pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid("min", "The amount must be at least 0."));
    }
    Ok(())
}

pub fn max_chars(value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(invalid(
            "length",
            format!("The value may not be greater than {} characters.", max),
        ));
    }
    Ok(())
}

pub fn contract_type(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<ContractType>()
        .map(|_| ())
        .map_err(|_| invalid("in", "The selected contract type is invalid."))
}

pub fn offer_status(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<OfferStatus>()
        .map(|_| ())
        .map_err(|_| invalid("in", "The selected status is invalid."))
}

pub fn any_role(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Role>()
        .map(|_| ())
        .map_err(|_| invalid("in", "The selected role is invalid."))
}

/// Self-registration cannot create administrators.
pub fn registrable_role(value: &str) -> Result<(), ValidationError> {
    match value.parse::<Role>() {
        Ok(Role::Company) | Ok(Role::Candidate) => Ok(()),
        _ => Err(invalid("in", "The selected role is invalid.")),
    }
}
