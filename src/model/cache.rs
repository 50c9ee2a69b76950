use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;

use crate::error::Result;
use crate::feature::FeatureExtractor;
use crate::pool::WorkerPool;
use crate::space::ConfigSpace;

/// Lazily computed feature vectors, keyed by configuration index.
///
/// Missing entries are extracted in parallel on the caller's pool. Entries
/// live until the extraction strategy changes.
pub struct FeatureCache {
    space: Arc<dyn ConfigSpace>,
    extractor: Arc<dyn FeatureExtractor>,
    entries: RwLock<HashMap<usize, Arc<[f64]>>>,
}

impl FeatureCache {
    /// Creates an empty cache over `space`.
    #[must_use]
    pub fn new(space: Arc<dyn ConfigSpace>, extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self {
            space,
            extractor,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The space features are extracted from.
    #[must_use]
    pub fn space(&self) -> &Arc<dyn ConfigSpace> {
        &self.space
    }

    /// The current extraction strategy.
    #[must_use]
    pub fn extractor(&self) -> &Arc<dyn FeatureExtractor> {
        &self.extractor
    }

    /// Swap the extraction strategy and drop every cached vector.
    pub fn set_extractor(&mut self, extractor: Arc<dyn FeatureExtractor>) {
        self.extractor = extractor;
        self.entries.get_mut().clear();
    }

    /// Number of cached vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Feature vectors for `indices`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`](crate::Error::PoolClosed) if some
    /// vector still has to be extracted and `pool` has been closed.
    pub fn get(&self, indices: &[usize], pool: &WorkerPool) -> Result<Vec<Arc<[f64]>>> {
        let mut missing: Vec<usize> = {
            let entries = self.entries.read();
            indices
                .iter()
                .copied()
                .filter(|i| !entries.contains_key(i))
                .collect()
        };

        if !missing.is_empty() {
            missing.sort_unstable();
            missing.dedup();

            let space = &*self.space;
            let extractor = &*self.extractor;
            let extracted: Vec<(usize, Arc<[f64]>)> = pool.install(|| {
                missing
                    .par_iter()
                    .map(|&i| (i, Arc::from(extractor.extract(space, i))))
                    .collect()
            })?;

            self.entries.write().extend(extracted);
        }

        let entries = self.entries.read();
        Ok(indices
            .iter()
            .map(|i| entries.get(i).map_or_else(|| Arc::from(Vec::new()), Arc::clone))
            .collect())
    }
}

impl core::fmt::Debug for FeatureCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeatureCache")
            .field("kind", &self.extractor.kind())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
