use google::GoogleConfig;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("{0} must list at least one sheet")]
    NoSheets(&'static str),

    #[error("Duplicate sheet name in {0}: {1}")]
    DuplicateSheet(&'static str, String),

    #[error("Empty sheet name in {0}")]
    EmptySheetName(&'static str),

    #[error("Admin token cannot be blank")]
    BlankAdminToken,

    #[error("max_upload_bytes cannot be 0")]
    InvalidUploadLimit,

    #[error("Google config: {0}")]
    Google(#[from] google::config::ValidationError),
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_admin_sheets() -> Vec<String> {
    [
        "Portfolio",
        "Services",
        "Testimonials",
        "Clients",
        "Bookings",
        "Inquiries",
        "Settings",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_website_sheets() -> Vec<String> {
    ["Portfolio", "Services", "Testimonials", "Clients", "Settings"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AdminConfig {
    /// Bearer token required on admin routes. Routes are open when unset.
    pub token: Option<String>,
    /// Sheets returned by the admin data endpoint and open to row writes.
    #[serde(default = "default_admin_sheets")]
    pub sheets: Vec<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        AdminConfig {
            token: None,
            sheets: default_admin_sheets(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WebsiteConfig {
    /// Sheets served to the public website.
    #[serde(default = "default_website_sheets")]
    pub sheets: Vec<String>,
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        WebsiteConfig {
            sheets: default_website_sheets(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    pub google: GoogleConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub website: WebsiteConfig,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn validate_sheet_list(section: &'static str, sheets: &[String]) -> Result<(), ValidationError> {
    if sheets.is_empty() {
        return Err(ValidationError::NoSheets(section));
    }

    let mut seen = HashSet::new();
    for sheet in sheets {
        if sheet.trim().is_empty() {
            return Err(ValidationError::EmptySheetName(section));
        }
        if !seen.insert(sheet) {
            return Err(ValidationError::DuplicateSheet(section, sheet.clone()));
        }
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.google.validate()?;

        if self
            .admin
            .token
            .as_ref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(ValidationError::BlankAdminToken);
        }
        validate_sheet_list("admin.sheets", &self.admin.sheets)?;
        validate_sheet_list("website.sheets", &self.website.sheets)?;

        if self.max_upload_bytes == 0 {
            return Err(ValidationError::InvalidUploadLimit);
        }

        Ok(())
    }
}
