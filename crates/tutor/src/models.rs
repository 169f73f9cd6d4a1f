//! These models represent the objects passed between the tutor's parts
//!
//! There are three related formats:
//! - conversation messages, sent from a client to the relay
//! - model server requests and stream frames, exchanged between the relay and the model server
//! - relay events, streamed from the relay back to the client
//!
//! The relay converts between them at its boundaries and never forwards one
//! format verbatim as another.
pub mod event;
pub mod message;
pub mod role;
pub mod wire;
