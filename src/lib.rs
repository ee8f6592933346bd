pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{memory::InMemoryStore, storage::LocalStorage, supabase::SupabaseStore};
pub use config::RosterConfig;
pub use core::{Scheduler, Session, SessionManager};
pub use utils::error::{Result, RosterError};
