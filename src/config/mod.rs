mod server;

pub use server::{Limits, ServerConfig};
