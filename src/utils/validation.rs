use crate::utils::error::{BillEtlError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_month(field_name: &str, month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(BillEtlError::InvalidValueError {
            field: field_name.to_string(),
            value: month.to_string(),
            reason: "month must be between 1 and 12".to_string(),
        });
    }
    Ok(())
}

pub fn validate_hour(field_name: &str, hour: u32) -> Result<()> {
    if !(1..=24).contains(&hour) {
        return Err(BillEtlError::InvalidValueError {
            field: field_name.to_string(),
            value: hour.to_string(),
            reason: "hour must be between 1 and 24 (hour 24 is 23:00-24:00)".to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BillEtlError::InvalidValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_negative(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(BillEtlError::InvalidValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "value must be a finite, non-negative number".to_string(),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| BillEtlError::MissingConfigError {
        field: field_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_month() {
        assert!(validate_month("months", 1).is_ok());
        assert!(validate_month("months", 12).is_ok());
        assert!(validate_month("months", 0).is_err());
        assert!(validate_month("months", 13).is_err());
    }

    #[test]
    fn test_validate_hour() {
        assert!(validate_hour("hours", 1).is_ok());
        assert!(validate_hour("hours", 24).is_ok());
        assert!(validate_hour("hours", 0).is_err());
        assert!(validate_hour("hours", 25).is_err());
    }

    #[test]
    fn test_validate_non_negative() {
        assert!(validate_non_negative("price", 0.0).is_ok());
        assert!(validate_non_negative("price", 0.12).is_ok());
        assert!(validate_non_negative("price", -0.01).is_err());
        assert!(validate_non_negative("price", f64::NAN).is_err());
    }
}
