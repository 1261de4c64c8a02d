use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::TagStore;
use crate::{DetailProvider, LyricsProvider};

/// The collaborators a tagging run works with. Providers are kept in registration order,
/// which is the order they are queried in.
#[derive(Clone)]
pub struct Services {
    details: Vec<Arc<dyn DetailProvider>>,
    lyrics: Vec<Arc<dyn LyricsProvider>>,
    store: Arc<dyn TagStore>,
}

impl Services {
    pub fn details(&self) -> &[Arc<dyn DetailProvider>] {
        &self.details
    }

    pub fn lyrics(&self) -> &[Arc<dyn LyricsProvider>] {
        &self.lyrics
    }

    pub fn store(&self) -> &Arc<dyn TagStore> {
        &self.store
    }

    pub fn detail(&self, id: &str) -> Option<&Arc<dyn DetailProvider>> {
        self.details.iter().find(|p| p.id() == id)
    }

    pub fn lyrics_provider(&self, id: &str) -> Option<&Arc<dyn LyricsProvider>> {
        self.lyrics.iter().find(|p| p.id() == id)
    }

    pub fn list_details(&self) -> Vec<(&str, &str)> {
        self.details.iter().map(|p| (p.id(), p.name())).collect()
    }

    pub fn list_lyrics(&self) -> Vec<(&str, &str)> {
        self.lyrics.iter().map(|p| (p.id(), p.name())).collect()
    }
}

pub struct ServicesBuilder {
    details: Vec<Arc<dyn DetailProvider>>,
    lyrics: Vec<Arc<dyn LyricsProvider>>,
    store: Option<Arc<dyn TagStore>>,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        Self {
            details: Vec::new(),
            lyrics: Vec::new(),
            store: None,
        }
    }

    /// Register a detail provider. A provider with the same id replaces the earlier one in
    /// its slot.
    pub fn add_detail(mut self, provider: impl DetailProvider + 'static) -> Self {
        let provider: Arc<dyn DetailProvider> = Arc::new(provider);
        match self.details.iter().position(|p| p.id() == provider.id()) {
            Some(index) => self.details[index] = provider,
            None => self.details.push(provider),
        }
        self
    }

    pub fn add_lyrics(mut self, provider: impl LyricsProvider + 'static) -> Self {
        let provider: Arc<dyn LyricsProvider> = Arc::new(provider);
        match self.lyrics.iter().position(|p| p.id() == provider.id()) {
            Some(index) => self.lyrics[index] = provider,
            None => self.lyrics.push(provider),
        }
        self
    }

    pub fn store(mut self, store: impl TagStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn TagStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Services> {
        if self.details.is_empty() && self.lyrics.is_empty() {
            return Err(Error::NotConfigured("at least one provider"));
        }
        let Some(store) = self.store else {
            return Err(Error::NotConfigured("tag store"));
        };

        Ok(Services {
            details: self.details,
            lyrics: self.lyrics,
            store,
        })
    }
}

impl Default for ServicesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FileNameProvider, SidecarLyricsProvider};
    use crate::store::MemoryStore;

    #[test]
    fn build_requires_a_provider_and_a_store() {
        assert!(matches!(
            ServicesBuilder::new().store(MemoryStore::new()).build(),
            Err(Error::NotConfigured(_))
        ));
        assert!(matches!(
            ServicesBuilder::new().add_detail(FileNameProvider::new()).build(),
            Err(Error::NotConfigured("tag store"))
        ));
    }

    #[test]
    fn providers_keep_registration_order() {
        let services = ServicesBuilder::new()
            .add_lyrics(SidecarLyricsProvider::new())
            .add_detail(FileNameProvider::new())
            .add_detail(FileNameProvider::new())
            .store(MemoryStore::new())
            .build()
            .unwrap();

        assert_eq!(services.list_details(), vec![("filename", "File name")]);
        assert!(services.detail("filename").is_some());
        assert!(services.lyrics_provider("sidecar").is_some());
        assert!(services.detail("missing").is_none());
    }
}
