mod client;
pub mod listener;
mod types;

pub use client::{PlexClient, UploadSource};
pub use types::{Item, Section, ThemeEntry};
