//! Application services layer.

pub mod blog;
pub mod contact;
pub mod error;
pub mod repos;
pub mod sections;
pub mod stream;
