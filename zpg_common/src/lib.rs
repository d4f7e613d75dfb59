mod cents;

pub mod helpers;
pub mod op;

pub use cents::{Cents, CentsConversionError, USD_CURRENCY_CODE};
