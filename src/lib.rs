// Library exports for the notifly crate
// This allows the binary and integration tests to use the modules

pub mod config;
pub mod email;
pub mod error;
pub mod mailbox;
pub mod pipeline;
pub mod processor;
pub mod publish;
pub mod store;

// Classification of stored emails
pub mod triage;
