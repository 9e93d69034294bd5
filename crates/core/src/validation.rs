use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::types::{AuthorityPatch, ClientPatch, NewAuthority, NewClient, NewProduct, ProductPatch};

/// A single rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Form submission rejected before touching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field,
                message: message.into(),
            }],
        }
    }

    /// Returns `true` when the provided field was rejected.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|err| err.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed")?;
        for (index, err) in self.errors.iter().enumerate() {
            let sep = if index == 0 { ": " } else { ", " };
            write!(f, "{sep}{} {}", err.field, err.message)?;
        }
        Ok(())
    }
}

/// Accumulates field errors so a form reports every problem at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&mut self, field: &'static str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.reject(field, "is required");
        }
        self
    }

    /// Like [`Validator::require`] but only for values present in a patch.
    pub fn require_if_present(&mut self, field: &'static str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.require(field, value);
        }
        self
    }

    pub fn check(&mut self, field: &'static str, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.reject(field, message);
        }
        self
    }

    pub fn reject(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    pub fn finish(&mut self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: std::mem::take(&mut self.errors),
            })
        }
    }
}

fn is_valid_url(value: &str) -> bool {
    Url::parse(value.trim()).is_ok()
}

impl NewClient {
    pub fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("name", &self.name)
            .require("document", &self.document)
            .require("email", &self.email)
            .require("phone", &self.phone)
            .finish()
    }
}

impl ClientPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require_if_present("name", self.name.as_deref())
            .require_if_present("document", self.document.as_deref())
            .require_if_present("email", self.email.as_deref())
            .require_if_present("phone", self.phone.as_deref())
            .finish()
    }
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("name", &self.name)
            .check("price", self.price >= Decimal::ZERO, "must not be negative")
            .check(
                "validity_months",
                self.validity_months > 0,
                "must be at least one month",
            )
            .finish()
    }
}

impl ProductPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require_if_present("name", self.name.as_deref())
            .check(
                "price",
                self.price.map_or(true, |price| price >= Decimal::ZERO),
                "must not be negative",
            )
            .check(
                "validity_months",
                self.validity_months != Some(0),
                "must be at least one month",
            )
            .finish()
    }
}

impl NewAuthority {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut validator = Validator::new();
        validator.require("name", &self.name).require("api_url", &self.api_url);
        if !self.api_url.trim().is_empty() && !is_valid_url(&self.api_url) {
            validator.reject("api_url", "must be an absolute URL");
        }
        validator.finish()
    }
}

impl AuthorityPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut validator = Validator::new();
        validator
            .require_if_present("name", self.name.as_deref())
            .require_if_present("api_url", self.api_url.as_deref());
        if let Some(api_url) = self.api_url.as_deref() {
            if !api_url.trim().is_empty() && !is_valid_url(api_url) {
                validator.reject("api_url", "must be an absolute URL");
            }
        }
        validator.finish()
    }
}
