//! Command implementations

pub mod convert;
pub mod info;
