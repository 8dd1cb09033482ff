// src/core/commands/generic/info.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Write;
use std::sync::atomic::Ordering;

/// Represents the `INFO` command. Only the `replication` section is
/// populated; an unknown section yields an empty reply.
#[derive(Debug, Clone, Default)]
pub struct Info {
    pub section: Option<String>,
}

impl ParseCommand for Info {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        match args.len() {
            0 => Ok(Info { section: None }),
            1 => Ok(Info {
                section: Some(extract_string(&args[0])?.to_ascii_lowercase()),
            }),
            _ => Err(PeridotError::WrongArgumentCount("info".to_string())),
        }
    }
}

#[async_trait]
impl ExecutableCommand for Info {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let mut out = String::new();
        if self
            .section
            .as_deref()
            .is_none_or(|section| section == "replication")
        {
            let replication = &ctx.state.replication;
            out.push_str("# Replication\r\n");
            match &ctx.state.config.replica_of {
                None => {
                    write!(
                        out,
                        "role:master\r\nconnected_slaves:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:{}\r\n",
                        replication.replica_states.len(),
                        replication.master_replid,
                        replication.master_repl_offset.load(Ordering::SeqCst),
                    )
                    .ok();
                }
                Some((host, port)) => {
                    write!(
                        out,
                        "role:slave\r\nmaster_host:{host}\r\nmaster_port:{port}\r\nmaster_repl_offset:{}\r\n",
                        replication.replica_applied_offset.load(Ordering::SeqCst),
                    )
                    .ok();
                }
            }
        }
        Ok((
            RespValue::BulkString(Bytes::from(out)),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for Info {
    fn name(&self) -> &'static str {
        "info"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        self.section
            .iter()
            .map(|s| Bytes::from(s.clone()))
            .collect()
    }
}
