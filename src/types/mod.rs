mod category;
mod models;
mod permission;

pub use category::{FileCategory, SizeCategory, extension};
pub use models::*;
pub use permission::{Access, Action, PermissionLevel};
