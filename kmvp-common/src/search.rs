use anyhow::Result;
use async_trait::async_trait;

use crate::candidate::CandidateRecord;

/// Number of candidates offered per page.
pub const PAGE_SIZE: u32 = 5;

/// Free-text search against a recording metadata service.
#[async_trait]
pub trait RecordingSearch: Send + Sync {
    async fn search(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<CandidateRecord>>;
}

/// Result offset of a 1-based page.
#[must_use]
pub fn page_offset(page: u32) -> u32 {
    page.saturating_sub(1) * PAGE_SIZE
}

/// Fetches one page of candidates. Search failures are logged and yield an
/// empty page so the user can still fall back to direct search or manual entry.
pub async fn search_page(search: &dyn RecordingSearch, query: &str, page: u32) -> Vec<CandidateRecord> {
    let offset = page_offset(page);
    tracing::debug!("Searching '{}' (page {}, offset {})", query, page, offset);

    match search.search(query, PAGE_SIZE, offset).await {
        Ok(records) => records
            .into_iter()
            .take(PAGE_SIZE as usize)
            .enumerate()
            .map(|(index, record)| CandidateRecord { index, ..record })
            .collect(),
        Err(e) => {
            tracing::error!("Metadata search error for '{}': {:#}", query, e);
            Vec::new()
        }
    }
}
