#![allow(non_snake_case)]

// Модель и кодек
pub mod record;
pub mod codec;
pub mod error;

// Операции над историями владения + типизированные команды
pub mod ledger;
pub mod command;

// Хранилища: трейт KvStore, MemStore, FileStore (+ журнал коммитов)
pub mod store;
pub mod journal;
pub mod lock;

pub mod config;
pub mod metrics;
pub mod cli;

// Удобные реэкспорты
pub use codec::{decode, decode_strict, decode_with, encode, DecodeMode};
pub use command::{Action, Command};
pub use config::{LedgerBuilder, LedgerConfig};
pub use error::{ErrorKind, LedgerError, LedgerResult, StoreError};
pub use ledger::{
    delete, initialize_holder, initialize_holders, load_record, move_holding, query, query_range,
};
pub use record::{parse_timestamp, HolderRecord, Interval, Timestamp};
pub use store::{FileStore, FileStoreStatus, KvStore, MemStore, ScanIter, WriteOp};
