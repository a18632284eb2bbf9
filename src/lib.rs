pub mod archive;
pub mod fetch;
pub mod monitor;
pub mod normalize;
pub mod output;
pub mod records;
pub mod schema;
pub mod triage;
