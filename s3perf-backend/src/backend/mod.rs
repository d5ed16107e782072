pub mod common;
pub mod in_memory;
pub mod s3_compatible;
