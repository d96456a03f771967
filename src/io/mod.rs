//! Stream codecs for the blob file format and the packet wire format.
//!
//! All operations are sequential reads/writes against one stream cursor;
//! nested structures recurse synchronously. Each encode/decode session
//! owns its stream position and must not be shared between concurrent
//! calls.

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

use crate::multival::{Opcode, TypeMask};

pub mod file;
pub mod packet;
pub mod primitives;
pub mod record;

/// Upper sanity bound on file-codec list counts. A corrupt length past
/// this aborts the decode before any allocation.
pub const MAX_FILE_LIST_LEN: i32 = 800_000;

/// Upper sanity bound on packet-codec list counts.
pub const MAX_PACKET_LIST_LEN: i32 = 8_192;

/// Unified error type for every codec operation.
///
/// Three families share this enum and stay distinguishable in
/// diagnostics: format errors (corrupt or unexpected bytes),
/// unsupported-operation errors (a kind/shape combination this codec
/// generation does not implement, i.e. a schema/codec coverage gap, not
/// bad input), and contract errors (caller misuse). No error is ever
/// swallowed or retried; every one aborts the whole structure operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid presence flag {0:#010x} (expected 0 or 1)")]
    BadPresenceFlag(u32),

    #[error("invalid boolean byte {0:#04x} (expected 0 or 1)")]
    BadBool(u8),

    #[error("list count {count} out of range (bound {max})")]
    ListBound { count: i64, max: i32 },

    #[error("framed structure declared {declared} bytes but {consumed} were consumed")]
    FramingMismatch { declared: u32, consumed: u64 },

    #[error("unknown multival opcode mnemonic {0:?}")]
    UnknownOpcode([u8; 4]),

    #[error("polymorph type index {index} out of range ({variants} declared variants)")]
    TypeIndexOutOfRange { index: i32, variants: usize },

    #[error("packet field index {index} out of range ({columns} serializable columns)")]
    FieldIndexOutOfRange { index: usize, columns: usize },

    #[error("column `{column}` is {scope}-only but the endpoint role is {role}")]
    ScopeViolation {
        column: String,
        scope: &'static str,
        role: &'static str,
    },

    #[error("file index {0} not present in the container file table")]
    FileIndexUnresolved(i32),

    #[error("file name `{0}` not present in the container file table")]
    FileNameUnresolved(String),

    #[error("no file table resolver supplied for a CurrentFile field")]
    NoFileTable,

    #[error("invalid UTF-8 in string field: {0}")]
    BadUtf8(#[from] FromUtf8Error),

    #[error("multival payload does not match opcode {op:?} (mask {expected:?})")]
    PayloadMismatch { op: Opcode, expected: TypeMask },

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("contract violation: {0}")]
    Contract(String),
}

impl Error {
    /// True for the format-error family: the input bytes are corrupt or
    /// inconsistent with the schema.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Error::BadPresenceFlag(_)
                | Error::BadBool(_)
                | Error::ListBound { .. }
                | Error::FramingMismatch { .. }
                | Error::UnknownOpcode(_)
                | Error::TypeIndexOutOfRange { .. }
                | Error::FieldIndexOutOfRange { .. }
                | Error::ScopeViolation { .. }
                | Error::FileIndexUnresolved(_)
                | Error::BadUtf8(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Bidirectional name/index lookup into the container's file table.
///
/// `CurrentFile` fields store an index into this table instead of an
/// inline string; the container layer supplies the resolver when opening
/// a blob. Index -1 is reserved for the absent reference and never
/// reaches the resolver.
pub trait FileIndex {
    /// Index of a file name, if the container knows it.
    fn index_of(&self, name: &str) -> Option<i32>;

    /// File name at an index, if the container knows it.
    fn name_of(&self, index: i32) -> Option<String>;
}

/// Resolver over a plain ordered name list, for tests and simple
/// containers.
#[derive(Debug, Default)]
pub struct FileTable {
    names: Vec<String>,
}

impl FileTable {
    pub fn new(names: Vec<String>) -> FileTable {
        FileTable { names }
    }
}

impl FileIndex for FileTable {
    fn index_of(&self, name: &str) -> Option<i32> {
        self.names.iter().position(|n| n == name).map(|i| i as i32)
    }

    fn name_of(&self, index: i32) -> Option<String> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.names.get(i).cloned())
    }
}
