//! Foundation types for the convergent fact-record merge engine (CFRM).
//!
//! This crate provides the identity and value types shared by every other
//! CFRM crate.
//!
//! # Key Types
//!
//! - [`OpId`]: 128-bit time-ordered operation identifier (UUID v7 layout)
//! - [`IdGenerator`]: mints strictly increasing [`OpId`]s from a [`Clock`]
//!   and a random source
//! - [`Object`]: the object position of a fact: a [`Scalar`] or a
//!   [`NodeRef`] to another node

pub mod clock;
pub mod error;
pub mod generator;
pub mod id;
pub mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TypeError;
pub use generator::{global, mint, IdGenerator};
pub use id::OpId;
pub use value::{NodeRef, Object, Scalar, NODE_ID_KEY};
