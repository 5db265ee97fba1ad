use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Where the wallet password lives. The agent only asks whether one exists;
/// checking it is the password flow's job.
pub trait CredentialStore {
    fn has_stored_credential(&self) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    stored: Arc<AtomicBool>,
}

impl MemoryCredentialStore {
    pub fn new(stored: bool) -> Self {
        Self {
            stored: Arc::new(AtomicBool::new(stored)),
        }
    }

    pub fn store(&self) {
        self.stored.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.stored.store(false, Ordering::SeqCst);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn has_stored_credential(&self) -> bool {
        self.stored.load(Ordering::SeqCst)
    }
}
