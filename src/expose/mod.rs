pub mod prom;
pub mod server;

pub use prom::Exposition;
pub use server::{AppState, router, serve};
