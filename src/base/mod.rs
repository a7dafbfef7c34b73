//! Base types and error handling.
//!
//! Provides the foundational types shared by every layer:
//! - [`TransportError`](neterror::TransportError): closed set of tagged errors
//! - [`SlotState`](loadstate::SlotState): connection slot states
//! - [`TransportKind`](kind::TransportKind): the dispatch table's kinds

pub mod context;
pub mod kind;
pub mod loadstate;
pub mod neterror;
