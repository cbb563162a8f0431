pub mod archive;
pub mod artifact;
pub mod blob;
pub mod sink;
