pub mod bulk;
pub mod dump;
pub mod single;
