//! Transport Layer
//!
//! Serial device enumeration and raw byte output, behind [`SerialBackend`] and
//! [`SerialLink`] so the link manager can run against the scripted backend in
//! [`mock`].

pub mod mock;
pub mod serial;
pub mod traits;

pub use serial::{TokioSerialBackend, TokioSerialLink};
pub use traits::{LinkStats, Parity, SerialBackend, SerialLink, SerialSettings, TransportError};
