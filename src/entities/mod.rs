//! Entity definition macros

#[macro_use]
pub mod macros;
