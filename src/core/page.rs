// src/core/page.rs
use bytes::Bytes;

/// Whether a fetched page has reached the page size.
///
/// Under append-only growth a full page never changes again, so only full
/// pages may be kept in the shared cache. A partial page is the tail of the
/// corpus and will grow as words are learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCompleteness {
    Full,
    Partial,
}

impl PageCompleteness {
    /// Full only at exactly `page_size` words. Callers trim longer fetches first.
    pub fn classify(word_count: usize, page_size: usize) -> Self {
        if word_count == page_size {
            PageCompleteness::Full
        } else {
            PageCompleteness::Partial
        }
    }

    pub fn is_cacheable(self) -> bool {
        self == PageCompleteness::Full
    }
}

/// A page body ready for the transport, always gzip-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedPage {
    pub body: Bytes,
    /// True when the body is held in the shared partition.
    pub cached: bool,
}

/// Result of computing one page payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome<E> {
    /// Full page, to be admitted into the partition.
    Cacheable(Bytes),
    /// Partial page, returned to the waiters but never stored.
    Bypass(Bytes),
    Failed(E),
}

impl<E> FillOutcome<E> {
    pub fn from_payload(payload: Bytes, completeness: PageCompleteness) -> Self {
        match completeness {
            PageCompleteness::Full => FillOutcome::Cacheable(payload),
            PageCompleteness::Partial => FillOutcome::Bypass(payload),
        }
    }

    pub fn into_served(self) -> Result<ServedPage, E> {
        match self {
            FillOutcome::Cacheable(body) => Ok(ServedPage { body, cached: true }),
            FillOutcome::Bypass(body) => Ok(ServedPage { body, cached: false }),
            FillOutcome::Failed(e) => Err(e),
        }
    }
}
