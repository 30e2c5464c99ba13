#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod constants;
pub mod models;
pub mod result;

pub use crate::constants::*;
pub use crate::models::*;
pub use crate::result::*;
