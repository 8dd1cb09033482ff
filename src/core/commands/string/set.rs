// src/core/commands/string/set.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{ArgParser, extract_bytes};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::{Duration, Instant};

/// The TTL option of a `SET` command.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum TtlOption {
    /// No TTL was provided; any existing TTL is dropped with the old value.
    #[default]
    None,
    Seconds(u64),
    Milliseconds(u64),
}

/// Represents the `SET` command. A successful `SET` overwrites a value of any
/// prior type.
#[derive(Debug, Clone, Default)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    pub ttl: TtlOption,
}

impl ParseCommand for Set {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() < 2 {
            return Err(PeridotError::WrongArgumentCount("set".to_string()));
        }
        let mut cmd = Set {
            key: extract_bytes(&args[0])?,
            value: extract_bytes(&args[1])?,
            ..Default::default()
        };

        let mut parser = ArgParser::new(&args[2..]);
        loop {
            if let Some(seconds) = parser.match_option::<i64>("ex")? {
                if seconds <= 0 {
                    return Err(PeridotError::InvalidExpireTime);
                }
                cmd.ttl = TtlOption::Seconds(seconds as u64);
            } else if let Some(ms) = parser.match_option::<i64>("px")? {
                if ms <= 0 {
                    return Err(PeridotError::InvalidExpireTime);
                }
                cmd.ttl = TtlOption::Milliseconds(ms as u64);
            } else {
                break;
            }
        }
        if !parser.remaining_args().is_empty() {
            return Err(PeridotError::SyntaxError);
        }
        Ok(cmd)
    }
}

#[async_trait]
impl ExecutableCommand for Set {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let expiry = match self.ttl {
            TtlOption::None => None,
            TtlOption::Seconds(s) => Some(Instant::now() + Duration::from_secs(s)),
            TtlOption::Milliseconds(ms) => Some(Instant::now() + Duration::from_millis(ms)),
        };

        let mut stored = StoredValue::new(DataValue::String(self.value.clone()));
        stored.expiry = expiry;

        let cache = ctx.cache_for_key_mut(&self.key)?;
        cache.put(self.key.clone(), stored);

        Ok((
            RespValue::SimpleString("OK".into()),
            WriteOutcome::Write,
        ))
    }
}

impl CommandSpec for Set {
    fn name(&self) -> &'static str {
        "set"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone(), self.value.clone()];
        match self.ttl {
            TtlOption::Seconds(s) => {
                args.extend([Bytes::from_static(b"EX"), s.to_string().into()]);
            }
            TtlOption::Milliseconds(ms) => {
                args.extend([Bytes::from_static(b"PX"), ms.to_string().into()]);
            }
            TtlOption::None => {}
        }
        args
    }
}
