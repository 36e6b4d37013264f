//! Text parsers: delimited rows and structured documents.

pub mod delimited;
pub mod structured;
