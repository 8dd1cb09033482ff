// src/core/commands/generic/replconf.rs

use crate::core::commands::command_trait::{CommandFlags, CommandSpec, ParseCommand};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::PeridotError;
use bytes::Bytes;

/// Represents the `REPLCONF` command in all its roles: the handshake options
/// (`listening-port`, `capa`), the primary's `GETACK *` probe, and the
/// replica's `ACK <offset>` answer. The router and replication handlers pick
/// the subcommand apart.
#[derive(Debug, Clone, Default)]
pub struct Replconf {
    pub args: Vec<Bytes>,
}

impl Replconf {
    pub fn subcommand(&self) -> Option<&Bytes> {
        self.args.first()
    }

    pub fn is_getack(&self) -> bool {
        self.subcommand()
            .is_some_and(|sub| sub.eq_ignore_ascii_case(b"GETACK"))
    }

    pub fn is_ack(&self) -> bool {
        self.subcommand()
            .is_some_and(|sub| sub.eq_ignore_ascii_case(b"ACK"))
    }
}

impl ParseCommand for Replconf {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.is_empty() {
            return Err(PeridotError::WrongArgumentCount("replconf".to_string()));
        }
        let args = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(Replconf { args })
    }
}

impl CommandSpec for Replconf {
    fn name(&self) -> &'static str {
        "replconf"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        self.args.clone()
    }
}
