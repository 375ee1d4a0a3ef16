use super::ProcessedPage;
use crate::storage::SharedStorage;
use crate::Result;

/// Persists processed pages to the result store
#[derive(Clone)]
pub struct ResultPipeline {
    storage: SharedStorage,
}

impl ResultPipeline {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Writes the page's own result, then its re-attached results as one batch
    ///
    /// # Returns
    ///
    /// Number of rows written
    pub fn persist(&self, page: &ProcessedPage) -> Result<usize> {
        let mut storage = self.storage.lock().unwrap_or_else(|e| e.into_inner());
        storage.save_result(&page.result)?;
        if !page.attached.is_empty() {
            storage.save_results(&page.attached)?;
        }
        Ok(1 + page.attached.len())
    }
}
