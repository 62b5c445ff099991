//! Energy curve used to match demanding tasks to high-energy hours.

mod curve;

pub use curve::{EnergyCurve, MAX_ENERGY, MIN_ENERGY};
