//! # Blob Codec Library
//!
//! This library provides **schema-driven serialization/deserialization**
//! for the blob asset format and its companion packet wire encoding.
//!
//! ## Purpose
//!
//! - Game data schemas are runtime data: a [`schema::Table`] describes
//!   the columns of one structure kind, and [`bind::bind`] resolves it
//!   once into the codec operations that apply to each column.
//! - Decoded structures are plain [`value::Record`] containers; all
//!   actual I/O goes through the drivers in [`io::record`].
//! - Two encodings share one schema: the **file codec** (fixed-width
//!   little-endian, size-prefixed framing) for blob containers, and the
//!   **packet codec** (bit-packed integers, sparse field streams) for
//!   live network traffic.
//!
//! Every decode failure is fatal for the whole structure; see
//! [`io::Error`] for the error families.
//!
//! ## Example
//! ```rust
//! use blobcodec::bind::bind;
//! use blobcodec::io::file::{FileReader, FileWriter};
//! use blobcodec::io::record::{read_record, write_record};
//! use blobcodec::schema::{Column, Table, TypeToken};
//! use blobcodec::value::{Field, Record, Value};
//!
//! let table = Table::new("PowerDef")
//!     .column(Column::new("name", TypeToken::String))
//!     .column(Column::new("cost", TypeToken::Int32))
//!     .into_rc();
//! let bound = bind(&table).unwrap();
//!
//! let rec = Record::new(
//!     table.clone(),
//!     vec![
//!         Field::Value(Value::Str("Fireball".into())),
//!         Field::Value(Value::Int32(25)),
//!     ],
//! );
//!
//! // Serialize it
//! let mut buf = Vec::new();
//! {
//!     let mut w = FileWriter::new(&mut buf);
//!     write_record(&mut w, &bound, &rec).unwrap();
//! }
//!
//! // Deserialize it
//! let mut r = FileReader::new(std::io::Cursor::new(buf));
//! assert_eq!(read_record(&mut r, &bound).unwrap(), rec);
//! ```

pub mod bind;
pub mod io;
pub mod multival;
pub mod schema;
pub mod value;

pub use io::{Error, Result};
