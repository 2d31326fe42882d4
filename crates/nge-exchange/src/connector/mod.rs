//! 거래 엔진 커넥터.

mod rest;
mod signer;

pub use rest::{NgeRestClient, NgeRestConfig};
pub use signer::{sign_request, SIGNATURE_TTL_SECS};
