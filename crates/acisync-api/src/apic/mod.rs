// Cisco APIC REST API: session login and class queries.

pub mod client;
pub mod models;

pub use client::{ApicClient, ClassQuery};
pub use models::{ImData, ManagedObject, rn_value, split_dn};
