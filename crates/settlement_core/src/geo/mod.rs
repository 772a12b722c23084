//! Pure geographic helpers: grid projection and great-circle distance.

pub mod distance;
pub mod transform;
