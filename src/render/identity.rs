//! Outbound network identity.

use std::sync::atomic::{AtomicUsize, Ordering};

/// The identity a session should fetch with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Bumped on every rotation; sessions rebuild their client when it changes
    pub generation: usize,
    /// Proxy URL, `None` for a direct connection
    pub proxy: Option<String>,
}

/// Supplies network identities. The engine only asks for a rotation after a
/// diversion; it never picks identities itself.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Identity;

    /// Move to a fresh identity and return it.
    fn rotate(&self) -> Identity;
}

/// Round-robin over a fixed list of proxy URLs.
#[derive(Debug, Default)]
pub struct ProxyRotation {
    proxies: Vec<String>,
    generation: AtomicUsize,
}

impl ProxyRotation {
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies: proxies
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            generation: AtomicUsize::new(0),
        }
    }

    /// Direct connection; rotation only bumps the generation.
    pub fn direct() -> Self {
        Self::default()
    }

    fn identity_for(&self, generation: usize) -> Identity {
        let proxy = match self.proxies.len() {
            0 => None,
            n => Some(self.proxies[generation % n].clone()),
        };
        Identity { generation, proxy }
    }
}

impl IdentityProvider for ProxyRotation {
    fn current(&self) -> Identity {
        self.identity_for(self.generation.load(Ordering::SeqCst))
    }

    fn rotate(&self) -> Identity {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let identity = self.identity_for(generation);
        log::info!(
            "Rotated identity (generation {}, proxy: {})",
            generation,
            identity.proxy.as_deref().unwrap_or("direct")
        );
        identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let rotation = ProxyRotation::new(vec![
            "http://p1:8000".into(),
            " ".into(),
            "http://p2:8000".into(),
        ]);
        assert_eq!(rotation.current().proxy.as_deref(), Some("http://p1:8000"));
        assert_eq!(rotation.rotate().proxy.as_deref(), Some("http://p2:8000"));
        assert_eq!(rotation.rotate().proxy.as_deref(), Some("http://p1:8000"));
        assert_eq!(rotation.current().generation, 2);
    }

    #[test]
    fn test_direct_rotation_bumps_generation() {
        let rotation = ProxyRotation::direct();
        assert_eq!(rotation.current(), Identity { generation: 0, proxy: None });
        assert_eq!(rotation.rotate().generation, 1);
        assert!(rotation.current().proxy.is_none());
    }
}
