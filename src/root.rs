//! Process-wide root collation data.
//!
//! The slot is explicit (`Lazy<Mutex<Option<..>>>`) rather than a plain
//! `Lazy<Arc<..>>` so embedders can install their own root table before
//! first use and tear the singleton down again, e.g. between tests.

use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

use crate::baked;
use crate::data::CollationData;
use crate::CollationError;

static ROOT: Lazy<Mutex<Option<Arc<CollationData>>>> = Lazy::new(|| Mutex::new(None));

pub struct CollationRoot;

impl CollationRoot {
    /// The shared root table, installing the baked default on first use.
    pub fn get() -> Result<Arc<CollationData>, CollationError> {
        Self::get_or_init(|| Ok(baked::root_fragment()))
    }

    /// First caller wins; later loaders are ignored. A failing loader
    /// leaves the slot empty so a later attempt can succeed.
    pub fn get_or_init<F>(loader: F) -> Result<Arc<CollationData>, CollationError>
    where
        F: FnOnce() -> Result<CollationData, CollationError>,
    {
        let mut slot = ROOT.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(data) = slot.as_ref() {
            return Ok(Arc::clone(data));
        }
        let data = Arc::new(loader()?);
        *slot = Some(Arc::clone(&data));
        Ok(data)
    }

    /// Drops the process-wide reference. Existing `Arc` holders keep their
    /// table; the next `get` rebuilds.
    pub fn reset() {
        let mut slot = ROOT.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}
