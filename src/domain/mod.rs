//! Domain vocabulary shared by the application and cache layers.

pub mod events;
pub mod fields;
pub mod people;
