#[doc(hidden)]
pub mod ids;
#[doc(hidden)]
pub mod path;
#[doc(hidden)]
pub mod phantom;

#[doc(inline)]
pub use ids::*;
#[doc(inline)]
pub use path::*;
#[doc(inline)]
pub use phantom::*;

#[cfg(test)]
mod test;
