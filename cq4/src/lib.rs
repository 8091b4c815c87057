//! A decoder for Chronicle Queue (`.cq4`) binary log files: a
//! memory-mapped framed record reader, a self-describing tag-driven wire
//! parser, and schema-driven secondary decoders for Chronicle's
//! length-prefixed binary encoding, Apache Thrift's compact protocol, and
//! Simple Binary Encoding (SBE).
//!
//! [`pipeline::decode_excerpt`] is the crate's main entry point once a
//! file is open via [`framing::FramedReader`]: it wire-parses a frame's
//! payload and, when a [`schema::Schema`] is loaded and the wire parser
//! couldn't find any self-describing fields, re-decodes the raw bytes
//! through whichever secondary decoder the schema's encoding calls for.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod classfile;
pub mod decode;
pub mod error;
pub mod framing;
pub mod pipeline;
pub mod schema;
pub mod stop_bit;
pub mod value;
pub mod wire;

pub use crate::error::{Error, Result};
pub use crate::framing::{Excerpt, FramedReader, QueueHeader};
pub use crate::pipeline::{decode_excerpt, Context, Message};
pub use crate::schema::{Encoding, Schema};
pub use crate::value::{OrderedMap, Value};
