// src/core/commands/generic/subscribe.rs

use crate::core::commands::command_trait::{CommandFlags, CommandSpec, ParseCommand};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::PeridotError;
use bytes::Bytes;

/// Represents the `SUBSCRIBE` command. Execution lives in the Pub/Sub
/// handler since it rewires the connection itself.
#[derive(Debug, Clone, Default)]
pub struct Subscribe {
    pub channels: Vec<Bytes>,
}

impl ParseCommand for Subscribe {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.is_empty() {
            return Err(PeridotError::WrongArgumentCount("subscribe".to_string()));
        }
        let channels = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(Subscribe { channels })
    }
}

impl CommandSpec for Subscribe {
    fn name(&self) -> &'static str {
        "subscribe"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::PUBSUB | CommandFlags::NO_PROPAGATE
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        self.channels.clone()
    }
}
