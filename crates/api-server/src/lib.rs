#![warn(clippy::unwrap_used)]

pub mod locks;
pub mod rest;
pub mod server;
pub mod swagger;

pub use locks::DrawLocks;
pub use server::ApiServer;
pub use swagger::ApiDoc;
