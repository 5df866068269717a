pub mod error;
#[cfg(feature = "web_actix")]
pub mod actix_ext;

pub use error::*;
