// src/core/commands/mod.rs

//! This module defines all supported commands, organizes them into categories,
//! and provides the central `Command` enum that encapsulates their parsed
//! state.

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use bytes::Bytes;

pub mod command_trait;
pub mod generic;
pub mod geospatial;
pub mod helpers;
pub mod list;
pub mod streams;
pub mod string;
pub mod zset;

use generic::{
    ConfigCmd, Del, Echo, Exists, FlushAll, Info, Keys, Ping, Psync, Publish, Replconf, Subscribe,
    TypeCmd, Unsubscribe, Wait,
};
use geospatial::{GeoAdd, GeoDist, GeoPos, GeoSearch};
use list::{BLPop, LLen, LPop, LPush, LRange, RPop, RPush};
use streams::{XAdd, XLen, XRange, XRead};
use string::{Decr, DecrBy, Get, Incr, IncrBy, Set};
use zset::{ZCard, ZRange, ZRank, ZRem, ZScore, Zadd};

/// A fully parsed command. Parsing happens once, at the connection edge; the
/// rest of the server passes this enum around.
#[derive(Debug, Clone)]
pub enum Command {
    // Generic
    Ping(Ping),
    Echo(Echo),
    Del(Del),
    Exists(Exists),
    Keys(Keys),
    Type(TypeCmd),
    Config(ConfigCmd),
    Info(Info),
    FlushAll(FlushAll),
    Wait(Wait),
    // Strings
    Get(Get),
    Set(Set),
    Incr(Incr),
    Decr(Decr),
    IncrBy(IncrBy),
    DecrBy(DecrBy),
    // Lists
    LPush(LPush),
    RPush(RPush),
    LPop(LPop),
    RPop(RPop),
    LLen(LLen),
    LRange(LRange),
    BLPop(BLPop),
    // Streams
    XAdd(XAdd),
    XRange(XRange),
    XRead(XRead),
    XLen(XLen),
    // Sorted sets
    Zadd(Zadd),
    ZRange(ZRange),
    ZRank(ZRank),
    ZScore(ZScore),
    ZRem(ZRem),
    ZCard(ZCard),
    // Geo
    GeoAdd(GeoAdd),
    GeoPos(GeoPos),
    GeoDist(GeoDist),
    GeoSearch(GeoSearch),
    // Pub/Sub
    Subscribe(Subscribe),
    Unsubscribe(Unsubscribe),
    Publish(Publish),
    // Replication
    Replconf(Replconf),
    Psync(Psync),
    // Transactions / connection control
    Multi,
    Exec,
    Discard,
    Quit,
}

impl TryFrom<RespFrame> for Command {
    type Error = PeridotError;

    /// Parses a command from its wire form, an array of bulk strings.
    fn try_from(frame: RespFrame) -> Result<Self, Self::Error> {
        let RespFrame::Array(frames) = frame else {
            return Err(PeridotError::Protocol(
                "expected an array of bulk strings".to_string(),
            ));
        };
        let Some((name_frame, args)) = frames.split_first() else {
            return Err(PeridotError::Protocol("empty command array".to_string()));
        };
        let name = extract_string(name_frame)
            .map_err(|_| PeridotError::Protocol("command name is not a bulk string".to_string()))?
            .to_ascii_lowercase();

        let command = match name.as_str() {
            "ping" => Command::Ping(Ping::parse(args)?),
            "echo" => Command::Echo(Echo::parse(args)?),
            "del" => Command::Del(Del::parse(args)?),
            "exists" => Command::Exists(Exists::parse(args)?),
            "keys" => Command::Keys(Keys::parse(args)?),
            "type" => Command::Type(TypeCmd::parse(args)?),
            "config" => Command::Config(ConfigCmd::parse(args)?),
            "info" => Command::Info(Info::parse(args)?),
            "flushall" => Command::FlushAll(FlushAll::parse(args)?),
            "wait" => Command::Wait(Wait::parse(args)?),
            "get" => Command::Get(Get::parse(args)?),
            "set" => Command::Set(Set::parse(args)?),
            "incr" => Command::Incr(Incr::parse(args)?),
            "decr" => Command::Decr(Decr::parse(args)?),
            "incrby" => Command::IncrBy(IncrBy::parse(args)?),
            "decrby" => Command::DecrBy(DecrBy::parse(args)?),
            "lpush" => Command::LPush(LPush::parse(args)?),
            "rpush" => Command::RPush(RPush::parse(args)?),
            "lpop" => Command::LPop(LPop::parse(args)?),
            "rpop" => Command::RPop(RPop::parse(args)?),
            "llen" => Command::LLen(LLen::parse(args)?),
            "lrange" => Command::LRange(LRange::parse(args)?),
            "blpop" => Command::BLPop(BLPop::parse(args)?),
            "xadd" => Command::XAdd(XAdd::parse(args)?),
            "xrange" => Command::XRange(XRange::parse(args)?),
            "xread" => Command::XRead(XRead::parse(args)?),
            "xlen" => Command::XLen(XLen::parse(args)?),
            "zadd" => Command::Zadd(Zadd::parse(args)?),
            "zrange" => Command::ZRange(ZRange::parse(args)?),
            "zrank" => Command::ZRank(ZRank::parse(args)?),
            "zscore" => Command::ZScore(ZScore::parse(args)?),
            "zrem" => Command::ZRem(ZRem::parse(args)?),
            "zcard" => Command::ZCard(ZCard::parse(args)?),
            "geoadd" => Command::GeoAdd(GeoAdd::parse(args)?),
            "geopos" => Command::GeoPos(GeoPos::parse(args)?),
            "geodist" => Command::GeoDist(GeoDist::parse(args)?),
            "geosearch" => Command::GeoSearch(GeoSearch::parse(args)?),
            "subscribe" => Command::Subscribe(Subscribe::parse(args)?),
            "unsubscribe" => Command::Unsubscribe(Unsubscribe::parse(args)?),
            "publish" => Command::Publish(Publish::parse(args)?),
            "replconf" => Command::Replconf(Replconf::parse(args)?),
            "psync" => Command::Psync(Psync::parse(args)?),
            "multi" => {
                if !args.is_empty() {
                    return Err(PeridotError::WrongArgumentCount("multi".to_string()));
                }
                Command::Multi
            }
            "exec" => {
                if !args.is_empty() {
                    return Err(PeridotError::WrongArgumentCount("exec".to_string()));
                }
                Command::Exec
            }
            "discard" => {
                if !args.is_empty() {
                    return Err(PeridotError::WrongArgumentCount("discard".to_string()));
                }
                Command::Discard
            }
            "quit" => Command::Quit,
            _ => return Err(PeridotError::UnknownCommand(name)),
        };
        Ok(command)
    }
}

impl Command {
    /// The per-command metadata, for everything but the unit variants.
    fn spec(&self) -> Option<&dyn CommandSpec> {
        match self {
            Command::Ping(c) => Some(c),
            Command::Echo(c) => Some(c),
            Command::Del(c) => Some(c),
            Command::Exists(c) => Some(c),
            Command::Keys(c) => Some(c),
            Command::Type(c) => Some(c),
            Command::Config(c) => Some(c),
            Command::Info(c) => Some(c),
            Command::FlushAll(c) => Some(c),
            Command::Wait(c) => Some(c),
            Command::Get(c) => Some(c),
            Command::Set(c) => Some(c),
            Command::Incr(c) => Some(c),
            Command::Decr(c) => Some(c),
            Command::IncrBy(c) => Some(c),
            Command::DecrBy(c) => Some(c),
            Command::LPush(c) => Some(c),
            Command::RPush(c) => Some(c),
            Command::LPop(c) => Some(c),
            Command::RPop(c) => Some(c),
            Command::LLen(c) => Some(c),
            Command::LRange(c) => Some(c),
            Command::BLPop(c) => Some(c),
            Command::XAdd(c) => Some(c),
            Command::XRange(c) => Some(c),
            Command::XRead(c) => Some(c),
            Command::XLen(c) => Some(c),
            Command::Zadd(c) => Some(c),
            Command::ZRange(c) => Some(c),
            Command::ZRank(c) => Some(c),
            Command::ZScore(c) => Some(c),
            Command::ZRem(c) => Some(c),
            Command::ZCard(c) => Some(c),
            Command::GeoAdd(c) => Some(c),
            Command::GeoPos(c) => Some(c),
            Command::GeoDist(c) => Some(c),
            Command::GeoSearch(c) => Some(c),
            Command::Subscribe(c) => Some(c),
            Command::Unsubscribe(c) => Some(c),
            Command::Publish(c) => Some(c),
            Command::Replconf(c) => Some(c),
            Command::Psync(c) => Some(c),
            Command::Multi | Command::Exec | Command::Discard | Command::Quit => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Multi => "multi",
            Command::Exec => "exec",
            Command::Discard => "discard",
            Command::Quit => "quit",
            _ => self.spec().expect("non-unit command has a spec").name(),
        }
    }

    pub fn get_flags(&self) -> CommandFlags {
        match self {
            Command::Multi | Command::Exec | Command::Discard => {
                CommandFlags::TRANSACTION | CommandFlags::NO_PROPAGATE
            }
            Command::Quit => CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE,
            _ => self.spec().expect("non-unit command has a spec").flags(),
        }
    }

    pub fn get_keys(&self) -> Vec<Bytes> {
        self.spec().map(|spec| spec.get_keys()).unwrap_or_default()
    }

    /// The command's wire form as `[NAME, arg, ...]`, ready for
    /// `encode_command`. Used for replica propagation and the AOF.
    pub fn to_wire_parts(&self) -> Vec<Bytes> {
        let mut parts = vec![Bytes::from(self.name().to_ascii_uppercase())];
        if let Some(spec) = self.spec() {
            parts.extend(spec.to_resp_args());
        }
        parts
    }

    /// The wire form a successful execution should propagate as. Blocked pops
    /// propagate the plain pop they amounted to, so replicas stay in step.
    pub fn propagation_parts(&self, reply: &RespValue) -> Vec<Bytes> {
        if let Command::BLPop(_) = self
            && let RespValue::Array(items) = reply
            && let Some(RespValue::BulkString(popped_key)) = items.first()
        {
            return vec![Bytes::from_static(b"LPOP"), popped_key.clone()];
        }
        self.to_wire_parts()
    }

    /// Dispatches execution to the command's handler. The unit variants and
    /// connection-rewiring commands are resolved earlier, by the router.
    pub async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        match self {
            Command::Ping(c) => c.execute(ctx).await,
            Command::Echo(c) => c.execute(ctx).await,
            Command::Del(c) => c.execute(ctx).await,
            Command::Exists(c) => c.execute(ctx).await,
            Command::Keys(c) => c.execute(ctx).await,
            Command::Type(c) => c.execute(ctx).await,
            Command::Config(c) => c.execute(ctx).await,
            Command::Info(c) => c.execute(ctx).await,
            Command::FlushAll(c) => c.execute(ctx).await,
            Command::Wait(c) => c.execute(ctx).await,
            Command::Get(c) => c.execute(ctx).await,
            Command::Set(c) => c.execute(ctx).await,
            Command::Incr(c) => c.execute(ctx).await,
            Command::Decr(c) => c.execute(ctx).await,
            Command::IncrBy(c) => c.execute(ctx).await,
            Command::DecrBy(c) => c.execute(ctx).await,
            Command::LPush(c) => c.execute(ctx).await,
            Command::RPush(c) => c.execute(ctx).await,
            Command::LPop(c) => c.execute(ctx).await,
            Command::RPop(c) => c.execute(ctx).await,
            Command::LLen(c) => c.execute(ctx).await,
            Command::LRange(c) => c.execute(ctx).await,
            Command::BLPop(c) => c.execute(ctx).await,
            Command::XAdd(c) => c.execute(ctx).await,
            Command::XRange(c) => c.execute(ctx).await,
            Command::XRead(c) => c.execute(ctx).await,
            Command::XLen(c) => c.execute(ctx).await,
            Command::Zadd(c) => c.execute(ctx).await,
            Command::ZRange(c) => c.execute(ctx).await,
            Command::ZRank(c) => c.execute(ctx).await,
            Command::ZScore(c) => c.execute(ctx).await,
            Command::ZRem(c) => c.execute(ctx).await,
            Command::ZCard(c) => c.execute(ctx).await,
            Command::GeoAdd(c) => c.execute(ctx).await,
            Command::GeoPos(c) => c.execute(ctx).await,
            Command::GeoDist(c) => c.execute(ctx).await,
            Command::GeoSearch(c) => c.execute(ctx).await,
            Command::Publish(c) => c.execute(ctx).await,
            Command::Subscribe(_)
            | Command::Unsubscribe(_)
            | Command::Replconf(_)
            | Command::Psync(_)
            | Command::Multi
            | Command::Exec
            | Command::Discard
            | Command::Quit => Err(PeridotError::Internal(format!(
                "'{}' must be handled before generic dispatch",
                self.name()
            ))),
        }
    }
}
