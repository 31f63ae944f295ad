// Remote integration API client
pub mod client;

// Authorization flow: config resolution, launch, completion detection
pub mod auth;

// Connection state cache
pub mod cache;

// Runtime configuration
pub mod config;

// Session wiring (client + cache + attempt registry)
pub mod session;

pub use session::Session;
