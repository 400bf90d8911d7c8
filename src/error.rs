use thiserror::Error;

use crate::config::ConfigError;
use crate::facade::FacadeError;
use crate::impl_err;
use crate::matching::MatchError;
use crate::routing::SearchError;

/// The crate-level error. Note that an unreachable destination is not an
/// error: searches report it through `Option` and empty results.
#[derive(Error, Debug)]
pub enum Error {
    #[error("search failed: {0}")]
    Search(SearchError),

    #[error("map matching failed: {0}")]
    Matching(MatchError),

    #[error("invalid configuration: {0}")]
    Config(ConfigError),

    #[error("invalid graph data: {0}")]
    Facade(FacadeError),
}

impl_err!(SearchError, Search);
impl_err!(MatchError, Matching);
impl_err!(ConfigError, Config);
impl_err!(FacadeError, Facade);
