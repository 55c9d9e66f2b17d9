pub mod extract;
pub mod hook;
pub mod init;
pub mod processor;
pub mod show;
