//! HTTP route handlers

pub mod admin;
pub mod static_files;
pub mod status;

pub use admin::*;
pub use static_files::*;
pub use status::*;
