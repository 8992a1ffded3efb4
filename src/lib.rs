pub mod cluster;
pub mod config;
pub mod contexts;
pub mod controlled;
pub mod entity;
pub mod error;
pub mod files;
pub mod format;
pub mod kube_cluster;
pub mod request;
pub mod resolver;
pub mod retry;
pub mod router;
pub mod server;
pub mod status;

#[cfg(test)]
mod fake;
