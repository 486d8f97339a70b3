//! Library side of the `rowbind` command line tool.

pub mod logging;
pub mod schema;
pub mod validate;
