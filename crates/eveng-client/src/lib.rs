//! `eve-client`: the blocking capability boundary to an EVE-NG server.
//!
//! The [`EvengApi`] trait is the synchronous surface the async core wraps.
//! [`HttpEvengClient`] implements it over the platform's REST API with a
//! cookie-backed session; tests substitute scripted doubles.
//!
//! Nothing in this crate classifies failures into the shared taxonomy.
//! Every method returns a raw [`CapabilityError`] and leaves the mapping to
//! the call adapter in `eve-core`.

pub mod api;
pub mod error;
pub mod http;
pub mod wire;

pub use api::{EvengApi, EvengConnector, NewLab, NewNetwork, NewNode, NodeAction};
pub use error::{CapResult, CapabilityError};
pub use http::{HttpConnector, HttpEvengClient};
