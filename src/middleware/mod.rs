// HTTP layers shared by every route

pub mod cors;

pub use cors::*;
