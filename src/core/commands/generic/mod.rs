// src/core/commands/generic/mod.rs

pub mod config;
pub mod del;
pub mod echo;
pub mod exists;
pub mod flushall;
pub mod info;
pub mod keys;
pub mod ping;
pub mod psync;
pub mod publish;
pub mod replconf;
pub mod subscribe;
pub mod type_cmd;
pub mod unsubscribe;
pub mod wait;

pub use config::ConfigCmd;
pub use del::Del;
pub use echo::Echo;
pub use exists::Exists;
pub use flushall::FlushAll;
pub use info::Info;
pub use keys::Keys;
pub use ping::Ping;
pub use psync::Psync;
pub use publish::Publish;
pub use replconf::Replconf;
pub use subscribe::Subscribe;
pub use type_cmd::TypeCmd;
pub use unsubscribe::Unsubscribe;
pub use wait::Wait;
