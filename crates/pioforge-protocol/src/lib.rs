//! Wire protocol for pioforge.
//!
//! This crate defines the "language" the legacy game client speaks on its
//! persistent socket:
//!
//! - **Values** ([`Value`]): the typed leaves that travel on the wire.
//! - **Codec** ([`encode`], [`decode`], [`WireCodec`]): how a list of
//!   values becomes bytes and back, using the Player.IO tag format.
//! - **Envelope** ([`Envelope`]): a decoded value list reinterpreted as an
//!   optional type tag plus key/value fields.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer is the leaf of the workspace. It knows nothing
//! about sockets, players, or handlers:
//!
//! ```text
//! Transport (bytes) → Protocol (Vec<Value> → Envelope) → Router (handler)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod envelope;
mod error;
mod types;
mod value;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{decode, encode, encode_message, WireCodec};
pub use envelope::{Envelope, UNDETERMINED};
pub use error::ProtocolError;
pub use types::{epoch_millis, server_time, PlayerId};
pub use value::Value;
