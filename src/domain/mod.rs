//! Domain layer types and invariants.

pub mod contact;
pub mod entities;
pub mod error;
pub mod sections;
pub mod slug;
