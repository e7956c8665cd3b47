pub mod cleanup;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod installer;
pub mod package;
pub mod registry;
pub mod runtime;
pub mod selfcheck;
