// src/core/commands/generic/psync.rs

use crate::core::commands::command_trait::{CommandFlags, CommandSpec, ParseCommand};
use crate::core::commands::helpers::{extract_string, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::PeridotError;
use bytes::Bytes;

/// Represents the `PSYNC` command. Receiving it converts the connection into
/// a replica link, so the connection handler intercepts it before routing.
#[derive(Debug, Clone, Default)]
pub struct Psync {
    pub replication_id: String,
    pub offset: String,
}

impl ParseCommand for Psync {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 2, "psync")?;
        Ok(Psync {
            replication_id: extract_string(&args[0])?,
            offset: extract_string(&args[1])?,
        })
    }
}

impl CommandSpec for Psync {
    fn name(&self) -> &'static str {
        "psync"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![
            Bytes::from(self.replication_id.clone()),
            Bytes::from(self.offset.clone()),
        ]
    }
}
