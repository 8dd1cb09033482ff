// src/core/commands/generic/unsubscribe.rs

use crate::core::commands::command_trait::{CommandFlags, CommandSpec, ParseCommand};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::PeridotError;
use bytes::Bytes;

/// Represents the `UNSUBSCRIBE` command. With no channels given, all of the
/// connection's subscriptions are dropped.
#[derive(Debug, Clone, Default)]
pub struct Unsubscribe {
    pub channels: Vec<Bytes>,
}

impl ParseCommand for Unsubscribe {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        let channels = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(Unsubscribe { channels })
    }
}

impl CommandSpec for Unsubscribe {
    fn name(&self) -> &'static str {
        "unsubscribe"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::PUBSUB | CommandFlags::NO_PROPAGATE
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        self.channels.clone()
    }
}
