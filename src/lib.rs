#![doc = include_str!("../README.md")]

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;
#[cfg_attr(feature = "mimalloc", global_allocator)]
#[cfg(feature = "mimalloc")]
static GLOBAL: MiMalloc = MiMalloc;

pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod heap;
pub mod matching;
pub mod primitives;
pub mod routing;
pub mod util;

#[cfg(test)]
pub(crate) mod fixtures;

#[doc(inline)]
pub use config::EngineConfig;
#[doc(inline)]
pub use engine::{Algorithm, Ch, Mld, SearchAlgorithm, SearchEngineData};
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use heap::QueryHeap;
#[doc(inline)]
pub use primitives::*;
