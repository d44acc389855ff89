//! This crate provides [`Plane`], an owned sample buffer, and [`MutableSubgrid`], a disjoint
//! mutable view into one. Allocations can be accounted with [`AllocTracker`].
mod alloc_tracker;
mod mutable_subgrid;
mod plane;

pub use alloc_tracker::*;
pub use mutable_subgrid::*;
pub use plane::*;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Allocation of the given number of bytes would exceed the memory limit.
    OutOfMemory(usize),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfMemory(bytes) => write!(f, "failed to allocate {bytes} byte(s)"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
