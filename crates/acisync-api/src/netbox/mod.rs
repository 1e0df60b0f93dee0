// NetBox REST API: token auth, paginated reads, create/patch.

pub mod client;
pub mod endpoint;
pub mod models;

pub use client::NetBoxClient;
pub use endpoint::Endpoint;
pub use models::{Object, Page, Status};
