//! command - разбор строковых вызовов в типизированные команды (один раз, на границе).
//!
//! Two entry forms, as sent by the hosting runtime:
//! - init:   flat list `entity ts entity ts ...` (even length);
//! - invoke: function `invoke`, args `[action, ...]` with action one of
//!   `move from to ts` | `query entity` | `queryAll start end` | `delete entity`.
//!
//! After parsing, ledger operations never look at strings to decide what to do.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger;
use crate::record::{parse_timestamp, Timestamp};
use crate::store::KvStore;

pub const INVOKE_FUNCTION: &str = "invoke";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move,
    Query,
    QueryAll,
    Delete,
}

impl FromStr for Action {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(Action::Move),
            "query" => Ok(Action::Query),
            "queryAll" => Ok(Action::QueryAll),
            "delete" => Ok(Action::Delete),
            other => Err(LedgerError::invalid(format!(
                "Unknown action {:?}, check the first argument, must be one of 'delete', 'query', 'queryAll' or 'move'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init { holdings: Vec<(String, Timestamp)> },
    Move { from: String, to: String, timestamp: Timestamp },
    Query { entity: String },
    QueryRange { start: String, end: String },
    Delete { entity: String },
}

impl Command {
    /// Parse the init argument list: alternating (entity, timestamp) pairs.
    pub fn parse_init<S: AsRef<str>>(args: &[S]) -> LedgerResult<Self> {
        if args.len() % 2 != 0 {
            return Err(LedgerError::invalid(
                "Incorrect number of arguments. Expecting an even number",
            ));
        }
        let mut holdings = Vec::with_capacity(args.len() / 2);
        for pair in args.chunks_exact(2) {
            let entity = pair[0].as_ref();
            let ts = parse_timestamp(pair[1].as_ref()).ok_or_else(|| {
                LedgerError::invalid(format!(
                    "Expecting integer value for asset holding, got {:?} for {}",
                    pair[1].as_ref(),
                    entity
                ))
            })?;
            holdings.push((entity.to_string(), ts));
        }
        Ok(Command::Init { holdings })
    }

    /// Parse an invoke call: `function` must be `invoke`, `args[0]` selects the action.
    pub fn parse_invoke<S: AsRef<str>>(function: &str, args: &[S]) -> LedgerResult<Self> {
        if function != INVOKE_FUNCTION {
            return Err(LedgerError::invalid(format!("Unknown function call {:?}", function)));
        }
        if args.len() < 2 {
            return Err(LedgerError::invalid(
                "Incorrect number of arguments. Expecting at least 2",
            ));
        }
        let arg = |i: usize| args[i].as_ref().to_string();

        match args[0].as_ref().parse::<Action>()? {
            Action::Move => {
                if args.len() != 4 {
                    return Err(LedgerError::invalid(
                        "Incorrect number of arguments. Expecting 4, action followed by 2 names and 1 value",
                    ));
                }
                let raw = args[3].as_ref();
                let timestamp = parse_timestamp(raw).ok_or_else(|| {
                    LedgerError::invalid(format!(
                        "Invalid timestamp {:?}, expecting an integer value",
                        raw
                    ))
                })?;
                Ok(Command::Move {
                    from: arg(1),
                    to: arg(2),
                    timestamp,
                })
            }
            Action::Query => {
                if args.len() != 2 {
                    return Err(LedgerError::invalid(
                        "Incorrect number of arguments. Expecting name of the entity to query",
                    ));
                }
                Ok(Command::Query { entity: arg(1) })
            }
            Action::QueryAll => {
                if args.len() != 3 {
                    return Err(LedgerError::invalid(
                        "Incorrect number of arguments. Expecting start and end keys of the range",
                    ));
                }
                Ok(Command::QueryRange {
                    start: arg(1),
                    end: arg(2),
                })
            }
            Action::Delete => {
                if args.len() != 2 {
                    return Err(LedgerError::invalid(
                        "Incorrect number of arguments. Expecting name of the entity to delete",
                    ));
                }
                Ok(Command::Delete { entity: arg(1) })
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Init { .. } => "init",
            Command::Move { .. } => "move",
            Command::Query { .. } => "query",
            Command::QueryRange { .. } => "queryAll",
            Command::Delete { .. } => "delete",
        }
    }

    /// Run the command. Mutations return an empty payload; queries return raw stored bytes.
    pub fn execute<S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        cfg: &LedgerConfig,
    ) -> LedgerResult<Vec<u8>> {
        debug!("execute: {}", self);
        match self {
            Command::Init { holdings } => {
                ledger::initialize_holders(store, holdings)?;
                Ok(Vec::new())
            }
            Command::Move {
                from,
                to,
                timestamp,
            } => {
                ledger::move_holding(store, cfg, from, to, *timestamp)?;
                Ok(Vec::new())
            }
            Command::Query { entity } => ledger::query(store, entity),
            Command::QueryRange { start, end } => ledger::query_range(store, start, end),
            Command::Delete { entity } => {
                ledger::delete(store, entity)?;
                Ok(Vec::new())
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Init { holdings } => write!(f, "init ({} holder(s))", holdings.len()),
            Command::Move {
                from,
                to,
                timestamp,
            } => write!(f, "move {} -> {} at {}", from, to, timestamp),
            Command::Query { entity } => write!(f, "query {}", entity),
            Command::QueryRange { start, end } => write!(f, "queryAll [{:?}, {:?})", start, end),
            Command::Delete { entity } => write!(f, "delete {}", entity),
        }
    }
}
