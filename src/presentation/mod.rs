//! Askama views for pages and email bodies.

pub mod emails;
pub mod views;
