pub mod codes;
pub mod constants;
pub mod dates;
pub mod error;
pub mod supplements;

pub use codes::*;
pub use constants::*;
pub use dates::{date_from_1980, date_to_1980, wire_epoch, WIRE_DAYS_MAX};
pub use error::CasemixError;
pub use supplements::*;
