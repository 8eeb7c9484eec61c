//! Portfolio site with a scribblings blog and a contact form.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
