pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod logging;
pub mod reduce;
pub mod search;
pub mod storage;
pub mod util;

pub use crate::error::SearchError;
pub use crate::fingerprint::{fingerprint, Fingerprint, FingerprintBuilder};
pub use crate::search::{find_top_phrases, find_top_phrases_with, SearchConfig, TopPhrase};
