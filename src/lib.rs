pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod interrupt;
pub mod ops;
pub mod payload;
pub mod request;
pub mod results;
pub mod session;
