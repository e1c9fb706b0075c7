// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod id;
mod owner_key;

pub use id::{ContainerId, ExecId, Id, NetworkId, SandboxId};
pub use owner_key::{OwnerKey, OwnerKeyError};
