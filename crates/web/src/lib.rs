//! imgreg Web
//!
//! Serves the image registration page: a two-field form whose records are
//! kept in the browser's local storage of the serving origin.

pub mod server;
pub mod static_files;

pub use server::{WebServer, WebServerConfig};
pub use static_files::StaticFiles;
