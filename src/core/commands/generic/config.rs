// src/core/commands/generic/config.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string, glob_match};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents `CONFIG GET pattern`. Only the `GET` subcommand is supported.
#[derive(Debug, Clone, Default)]
pub struct ConfigCmd {
    pub pattern: Bytes,
}

impl ParseCommand for ConfigCmd {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() != 2 {
            return Err(PeridotError::WrongArgumentCount("config".to_string()));
        }
        if !extract_string(&args[0])?.eq_ignore_ascii_case("get") {
            return Err(PeridotError::SyntaxError);
        }
        Ok(ConfigCmd {
            pattern: extract_bytes(&args[1])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for ConfigCmd {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let config = &ctx.state.config;
        let params: [(&str, String); 5] = [
            ("dir", config.dir.clone()),
            ("dbfilename", config.dbfilename.clone()),
            ("port", config.port.to_string()),
            (
                "appendonly",
                if config.aof_enabled { "yes" } else { "no" }.to_string(),
            ),
            ("appendfilename", config.appendfilename.clone()),
        ];

        let mut reply = Vec::new();
        for (name, value) in params {
            if glob_match(&self.pattern, name.as_bytes()) {
                reply.push(RespValue::BulkString(Bytes::from(name.to_string())));
                reply.push(RespValue::BulkString(Bytes::from(value)));
            }
        }
        Ok((RespValue::Array(reply), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for ConfigCmd {
    fn name(&self) -> &'static str {
        "config"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![Bytes::from_static(b"GET"), self.pattern.clone()]
    }
}
