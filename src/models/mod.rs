pub mod messages;
pub mod server;
