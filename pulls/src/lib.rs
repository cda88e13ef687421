//! Pull negotiation engine of the GigU marketplace client.
//!
//! Data flow:
//! UI → [`view_model::PullViewModel`] → [`repository::PullRepository`]
//! → identity / gateway / cache → `PullResult` snapshots back to the UI.

pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod remote;
pub mod repository;
pub mod session;
pub mod view_model;

pub use error::{ErrorKind, PullError, PullResult};
pub use repository::PullRepository;
