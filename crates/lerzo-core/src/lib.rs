pub mod config;
pub mod error;
pub mod types;

pub use error::{LerzoError, LerzoResult};
pub use types::{Collection, Dataset, Record};
