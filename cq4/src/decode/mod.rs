//! The schema-driven secondary decoders: [`binary`] for Chronicle's
//! `BINARY_LIGHT` encoding, [`thrift`] for Apache Thrift's compact
//! protocol, and [`sbe`] for Simple Binary Encoding.

pub mod binary;
pub mod sbe;
pub mod thrift;
