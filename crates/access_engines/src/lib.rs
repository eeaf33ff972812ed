#![forbid(unsafe_code)]

pub mod command;
pub mod interpret;
pub mod lifecycle;
pub mod policy;
