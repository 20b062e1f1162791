use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("spreadsheet_id cannot be empty")]
    EmptySpreadsheetId,

    #[error("credential field {0} cannot be empty")]
    EmptyCredential(&'static str),
}

/// How the service authenticates against Google.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum Credentials {
    /// OAuth2 client with a long-lived refresh token.
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    /// A fixed access token. Only useful for local development.
    AccessToken { token: String },
}

impl Credentials {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => {
                for (name, value) in [
                    ("client_id", client_id),
                    ("client_secret", client_secret),
                    ("refresh_token", refresh_token),
                ] {
                    if value.trim().is_empty() {
                        return Err(ValidationError::EmptyCredential(name));
                    }
                }
                Ok(())
            }
            Credentials::AccessToken { token } if token.trim().is_empty() => {
                Err(ValidationError::EmptyCredential("token"))
            }
            Credentials::AccessToken { .. } => Ok(()),
        }
    }
}

/// Base URLs of the Google APIs. Overridable so tests can use a mock server.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Endpoints {
    #[serde(default = "default_sheets_url")]
    pub sheets_url: Url,
    #[serde(default = "default_drive_url")]
    pub drive_url: Url,
    #[serde(default = "default_token_url")]
    pub token_url: Url,
}

impl Endpoints {
    /// Points every API at the same base URL.
    pub fn with_base(base: &Url) -> Self {
        Endpoints {
            sheets_url: base.clone(),
            drive_url: base.clone(),
            token_url: base.join("token").unwrap_or_else(|_| base.clone()),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            sheets_url: default_sheets_url(),
            drive_url: default_drive_url(),
            token_url: default_token_url(),
        }
    }
}

fn parse_static(url: &'static str) -> Url {
    Url::parse(url).expect("static Google endpoint is a valid URL")
}

fn default_sheets_url() -> Url {
    parse_static("https://sheets.googleapis.com/")
}

fn default_drive_url() -> Url {
    parse_static("https://www.googleapis.com/")
}

fn default_token_url() -> Url {
    parse_static("https://oauth2.googleapis.com/token")
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct GoogleConfig {
    pub credentials: Credentials,
    /// The spreadsheet acting as the database.
    pub spreadsheet_id: String,
    /// Drive folder receiving uploads. Uploads land in the root when unset.
    pub upload_folder_id: Option<String>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default = "default_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl GoogleConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(ValidationError::EmptySpreadsheetId);
        }
        self.credentials.validate()
    }
}
