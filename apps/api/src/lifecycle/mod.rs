// Candidate lifecycle: archival policy, reversible archive/restore moves between
// the active and archived partitions, the periodic sweep, and referrer notifications.

pub mod events;
pub mod handlers;
pub mod policy;
pub mod store;
pub mod sweep;
