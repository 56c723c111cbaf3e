pub mod compression;
pub mod profile;
pub mod progress;
pub mod translate;
