use std::collections::BTreeSet;
use std::sync::RwLock;

/// Registry of app-attribute namespaces.
///
/// External collaborators register a namespace once at wiring time; the
/// engine rejects reads and writes against unknown namespaces so a typo
/// in a collaborator cannot silently create a new data silo. Values
/// inside a namespace remain completely opaque.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    namespaces: RwLock<BTreeSet<String>>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-seeded with namespaces.
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: RwLock::new(namespaces.into_iter().map(Into::into).collect()),
        }
    }

    /// Register a namespace. Idempotent.
    pub fn register(&self, namespace: impl Into<String>) {
        self.namespaces
            .write()
            .expect("registry lock poisoned")
            .insert(namespace.into());
    }

    /// Returns `true` if the namespace has been registered.
    pub fn is_registered(&self, namespace: &str) -> bool {
        self.namespaces
            .read()
            .expect("registry lock poisoned")
            .contains(namespace)
    }

    /// The registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces
            .read()
            .expect("registry lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
