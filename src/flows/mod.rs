//! Provider-facing flows.

pub mod exchange;

pub use exchange::{
    authorization_url, HttpSessionExchange, MockSessionExchange, SessionExchange,
};
