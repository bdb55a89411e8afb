//! # Types
//!
//! Small value types shared by the parser, the data model and the host
//! adapters.

pub mod address;

pub use address::Address;
