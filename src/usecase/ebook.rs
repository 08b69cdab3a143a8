//! Ebook download: route a URL to the first site that accepts it.

use thiserror::Error;
use tracing::{info, instrument};

use crate::site::{DownloadError, SiteRegistry};

/// Errors from [`EbookDownloadUseCase::execute`].
#[derive(Debug, Error)]
pub enum EbookError {
    /// No registered site accepted the URL.
    #[error("unsupported URL '{url}': no configured site accepts it\n  Suggestion: check the URL, or list sites under [ebook] sites in the config file")]
    UnsupportedUrl {
        /// The rejected URL.
        url: String,
    },

    /// The accepting site failed.
    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// Downloads an ebook from whichever configured site handles its URL.
#[derive(Debug)]
pub struct EbookDownloadUseCase {
    sites: SiteRegistry,
}

impl EbookDownloadUseCase {
    /// Creates the use case over an ordered site registry.
    #[must_use]
    pub fn new(sites: SiteRegistry) -> Self {
        Self { sites }
    }

    /// The sites consulted, in order.
    #[must_use]
    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    /// Hands `url` to the first site whose `validate_url` accepts it and
    /// invokes its download exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`EbookError::UnsupportedUrl`] if no site accepts the URL, or
    /// [`EbookError::Download`] with the site's failure.
    #[instrument(skip(self))]
    pub async fn execute(&self, url: &str) -> Result<(), EbookError> {
        let site = self.sites.find_handler(url).ok_or_else(|| EbookError::UnsupportedUrl {
            url: url.to_string(),
        })?;
        info!(site = site.name(), "Dispatching download");
        site.download(url).await?;
        Ok(())
    }
}
