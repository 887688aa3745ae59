use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::BookingError;

/// Contact details collected on the `details` step.
///
/// Email checking is deliberately shallow: it must contain `@`, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CustomerDetails {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(
        length(min = 1, message = "email is required"),
        contains(pattern = "@", message = "email must contain '@'")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
}

impl CustomerDetails {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// Обрезает пробелы и проверяет поля.
    pub fn validated(self) -> Result<Self, BookingError> {
        let details = Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        };

        details.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|field| field.to_string())
                .collect();
            fields.sort();
            BookingError::validation(format!(
                "Please fill in all required customer details correctly (invalid: {})",
                fields.join(", ")
            ))
        })?;

        Ok(details)
    }
}
