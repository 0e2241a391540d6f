use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Geolocation,
    Notification,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Geolocation => write!(f, "geolocation"),
            Permission::Notification => write!(f, "notification"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{endpoint} answered {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("{0} permission denied")]
    PermissionDenied(Permission),

    #[error("Please login to send emergency alerts")]
    NotLoggedIn,
}

pub type Result<T> = std::result::Result<T, ClientError>;
