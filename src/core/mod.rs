//! Core infrastructure shared by the exchange and refresh paths.

pub mod transport;

pub use transport::{
    basic_authorization, encode_form, FormRequest, HttpResponse, HttpTransport,
    MockHttpTransport, ReqwestHttpTransport,
};
