pub mod auth_handler;

pub use auth_handler::handle_auth_request;
