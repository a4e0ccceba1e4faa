pub mod coordinator;
pub mod formatter;
pub mod hooks;
pub mod registry;
pub mod source;
pub mod storage;
