//! Concrete models built on the generic layer.

pub mod timed_role;

pub use timed_role::TimedRoles;
