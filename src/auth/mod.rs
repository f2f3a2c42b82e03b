pub mod admin;
pub mod credentials;
pub mod orchestrator;
pub mod refresher;
pub mod session;
pub mod state;
