// Adapters layer: concrete stores behind the domain ports.

pub mod memory;
pub mod storage;
pub mod supabase;
