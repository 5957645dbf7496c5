pub mod chat;
pub mod config_cmd;
pub mod onboard;
pub mod providers;
pub mod tools;
