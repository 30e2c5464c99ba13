use std::sync::Arc;

use tessera_core::Client;
use tokio::sync::watch;

/// Shared "current client" snapshot. Writers always replace the whole value.
pub trait ClientStateStore: Send + Sync {
    fn init(&self, client: Option<Client>);
    fn current(&self) -> Option<Arc<Client>>;
    fn update(&self, client: Client);
    fn clear(&self);
    fn subscribe(&self) -> watch::Receiver<Option<Arc<Client>>>;

    fn current_client_id(&self) -> Option<String> {
        self.current().map(|client| client.id.clone())
    }
}

pub struct InMemoryClientState {
    sender: watch::Sender<Option<Arc<Client>>>,
}

impl Default for InMemoryClientState {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryClientState {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }
}

impl ClientStateStore for InMemoryClientState {
    fn init(&self, client: Option<Client>) {
        self.sender.send_replace(client.map(Arc::new));
    }

    fn current(&self) -> Option<Arc<Client>> {
        self.sender.borrow().clone()
    }

    /// Observers are only woken when the snapshot actually changes.
    fn update(&self, client: Client) {
        self.sender.send_if_modified(|current| {
            if current.as_deref() == Some(&client) {
                return false;
            }
            *current = Some(Arc::new(client));
            true
        });
    }

    fn clear(&self) {
        self.sender.send_replace(None);
    }

    fn subscribe(&self) -> watch::Receiver<Option<Arc<Client>>> {
        self.sender.subscribe()
    }
}
