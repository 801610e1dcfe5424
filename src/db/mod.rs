pub mod admin;
pub mod plan;
pub mod request;
pub mod state;
pub mod store;
pub mod tx;
pub mod user;
pub mod utils;
