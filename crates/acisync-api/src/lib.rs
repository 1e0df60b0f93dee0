//! Async clients for the two systems acisync talks to.
//!
//! - [`apic::ApicClient`]: the Cisco APIC REST API (cookie session,
//!   class queries, `imdata` envelopes).
//! - [`netbox::NetBoxClient`]: the NetBox REST API (token auth, paginated
//!   list reads, create and partial update).
//!
//! Both share [`TransportConfig`] for TLS and timeouts and report failures
//! through the single [`Error`] type.

pub mod apic;
pub mod error;
pub mod netbox;
pub mod transport;

pub use apic::{ApicClient, ClassQuery, ManagedObject};
pub use error::Error;
pub use netbox::{Endpoint, NetBoxClient};
pub use transport::{TlsMode, TransportConfig};
