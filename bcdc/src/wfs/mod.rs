//! Accès au Web Feature Service (WFS 2.0)

pub mod client;
pub mod decode;
pub mod pager;
pub mod request;
pub mod xml;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ClientConfig, WfsClient};
pub use pager::{fetch_pages, PagePlan, PageRequest};
