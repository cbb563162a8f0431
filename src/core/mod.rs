pub mod profile;
pub mod tile;
