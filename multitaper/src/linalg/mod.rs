//! Dense and banded linear-algebra routines backing taper generation.

pub mod tridiagonal;

pub use tridiagonal::{top_eigenpairs, TopEigen};
