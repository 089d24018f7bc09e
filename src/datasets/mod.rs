pub mod ipasn;

pub use crate::datasets::ipasn::*;
