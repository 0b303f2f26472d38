//! Testing utilities and harness for Weft.

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
}
