//! Domain layer for canonical signing.

pub mod canonical;
pub mod digest;
pub mod entities;
pub mod errors;
