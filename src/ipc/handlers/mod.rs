pub mod attendance;
pub mod core;
pub mod filter;
pub mod modal;
