//! Site registry with first-match URL dispatch.

use std::fmt;

use tracing::debug;

use super::SiteDownloader;

/// An ordered collection of site downloaders.
///
/// Sites are consulted in registration order; the first whose
/// [`SiteDownloader::validate_url`] accepts a URL handles it.
#[derive(Default)]
pub struct SiteRegistry {
    sites: Vec<Box<dyn SiteDownloader>>,
}

impl SiteRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { sites: Vec::new() }
    }

    /// Registers a site after all previously registered ones.
    #[tracing::instrument(skip(self, site), fields(site_name))]
    pub fn register(&mut self, site: Box<dyn SiteDownloader>) {
        tracing::Span::current().record("site_name", site.name());
        debug!(name = site.name(), "Registering site");
        self.sites.push(site);
    }

    /// Returns the number of registered sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Returns true if no sites are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Returns site names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.sites.iter().map(|site| site.name()).collect()
    }

    /// Returns the first site that accepts `url`.
    #[must_use]
    pub fn find_handler(&self, url: &str) -> Option<&dyn SiteDownloader> {
        let handler = self
            .sites
            .iter()
            .find(|site| site.validate_url(url))
            .map(AsRef::as_ref);
        if let Some(site) = handler {
            debug!(site = site.name(), url, "Site accepted URL");
        }
        handler
    }
}

impl fmt::Debug for SiteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteRegistry")
            .field("sites", &self.names())
            .finish()
    }
}
