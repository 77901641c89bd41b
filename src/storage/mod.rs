pub mod classifier;
pub mod history;
pub mod settings;
