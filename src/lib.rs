pub mod aggregate;
pub mod collect;
pub mod config;
pub mod data;
pub mod error;
pub mod expose;
pub mod resolve;
pub mod runtime;
pub mod table;

pub use error::{Error, Result};
