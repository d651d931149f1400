//! Data model and configuration types.

pub mod config;
pub mod token;

pub use config::{ClientCredentials, DatabaseConfig, ProviderConfig, ServiceConfig};
pub use token::{
    epoch_now, AuthorizedSession, ProviderTokenResponse, SessionResponse, TokenRecord, ValidToken,
};
