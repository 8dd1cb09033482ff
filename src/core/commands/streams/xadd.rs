// src/core/commands/streams/xadd.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::stream::{IdSpec, Stream};
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;

/// Represents the `XADD` command.
#[derive(Debug, Clone)]
pub struct XAdd {
    pub key: Bytes,
    pub id_spec: IdSpec,
    pub fields: IndexMap<Bytes, Bytes>,
}

impl ParseCommand for XAdd {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() < 4 || args.len() % 2 != 0 {
            return Err(PeridotError::WrongArgumentCount("xadd".to_string()));
        }
        let key = extract_bytes(&args[0])?;
        let id_spec = IdSpec::parse(&extract_string(&args[1])?)?;
        let mut fields = IndexMap::new();
        for chunk in args[2..].chunks_exact(2) {
            fields.insert(extract_bytes(&chunk[0])?, extract_bytes(&chunk[1])?);
        }
        Ok(XAdd {
            key,
            id_spec,
            fields,
        })
    }
}

#[async_trait]
impl ExecutableCommand for XAdd {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let entry =
            cache.get_or_insert_with(&self.key, || StoredValue::new(DataValue::Stream(Stream::new())));
        let DataValue::Stream(stream) = &mut entry.data else {
            return Err(PeridotError::WrongType);
        };

        let id = stream.add_entry(self.id_spec, self.fields.clone())?;
        ctx.state.stream_blockers.notify_append(&self.key);
        Ok((
            RespValue::BulkString(id.to_string().into()),
            WriteOutcome::Write,
        ))
    }
}

impl CommandSpec for XAdd {
    fn name(&self) -> &'static str {
        "xadd"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let id_token: Bytes = match self.id_spec {
            IdSpec::Auto => Bytes::from_static(b"*"),
            IdSpec::AutoSeq(ms) => format!("{ms}-*").into(),
            IdSpec::Explicit(id) => id.to_string().into(),
        };
        let mut args = vec![self.key.clone(), id_token];
        for (field, value) in &self.fields {
            args.push(field.clone());
            args.push(value.clone());
        }
        args
    }
}
