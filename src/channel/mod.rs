pub mod machine;
pub mod manager;

pub use machine::{ConnectionState, LinkAction, LinkMachine};
pub use manager::ChannelManager;
