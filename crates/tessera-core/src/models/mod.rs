mod client;
mod errors;
mod token;

pub use client::*;
pub use errors::*;
pub use token::*;
