//! ---
//! cip_section: "05-catalog"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Catalog and login error types."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("laboratory {0} not found in catalog")]
    UnknownLab(String),
    #[error("laboratory {0} is not available for remote sessions")]
    LabUnavailable(String),
    #[error("invalid catalog asset {asset}: {source}")]
    InvalidAsset {
        asset: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("username must not be empty")]
    MissingUsername,
    #[error("password must not be empty")]
    MissingPassword,
}
