//! Library side of the `odk-aggregate` command line tool.

pub mod logging;
pub mod pipeline;
pub mod validate;
