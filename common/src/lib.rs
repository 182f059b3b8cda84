pub mod address;
pub mod challenge;
pub mod config;
pub mod error;
pub mod models;
pub mod signature;
pub mod utils;

pub use address::*;
pub use self::config::*;
pub use error::*;
pub use utils::*;
