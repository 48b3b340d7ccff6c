//! Record services.
//!
//! [`resources::ResourceService`] owns every operation on resource records; `helpers` holds
//! the sharded directory plumbing it shares with future record kinds.

pub(crate) mod helpers;
pub mod resources;
