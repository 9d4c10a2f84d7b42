//! Core types and trait definitions for the b04rd imageboard backend.
//!
//! This crate is deliberately free of HTTP, database and runtime
//! dependencies. Storage backends implement the traits in [`store`], remote
//! collaborators implement the traits in [`remote`], and the engine crate
//! composes them.

pub mod clock;
pub mod comment;
pub mod error;
pub mod lifecycle;
pub mod remote;
pub mod session;
pub mod store;
pub mod thread;

pub use error::{Error, ErrorKind, Result};
