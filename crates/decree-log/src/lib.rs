//! # decree-log
//!
//! why: keep the replicated log of a primary-backup partition consistent across replicas
//! relations: embedded by the replication engine, commits flow to decree-apply handlers
//! what: mutation window, role-aware prepare list, replica driver, config, logging

pub mod config;
pub mod error;
pub mod logging;
pub mod mutation;
pub mod prepare_list;
pub mod replica;
pub mod role;
pub mod window;

pub use config::LogConfig;
pub use error::{ConfigError, PrepareError, ProtocolViolation, WindowError};
pub use mutation::{Decree, Mutation};
pub use prepare_list::{CommitHandler, PrepareList};
pub use replica::{LogStatus, ReplicaLog};
pub use role::ReplicaRole;
pub use window::MutationWindow;
