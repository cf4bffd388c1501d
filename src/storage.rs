use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::model::{Nft, Order, Profile, User};

/// Nfts fetched by id during the session. Entries are never evicted on their own.
#[derive(Clone, Default)]
pub struct NftByIdStorage {
    storage: Arc<RwLock<HashMap<String, Nft>>>,
}

impl NftByIdStorage {
    pub fn save(&self, nft: Nft) {
        trace!(storage = "nfts", id = nft.id, "save nft");
        self.write().insert(nft.id.clone(), nft);
    }

    pub fn get(&self, id: &str) -> Option<Nft> {
        self.storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Returns the evicted nft, if there was one.
    pub fn remove(&self, id: &str) -> Option<Nft> {
        trace!(storage = "nfts", id, "remove nft");
        self.write().remove(id)
    }

    pub fn remove_all(&self) {
        debug!(storage = "nfts", "remove all nfts");
        self.write().clear();
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Nft>> {
        self.storage.write().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Command {
    Save(Order),
    Get {
        id: String,
        reply: oneshot::Sender<Option<Order>>,
    },
    RemoveNft(String),
    RemoveAll,
}

/// Orders known to the client. The map is owned by a single task and
/// every access is a message to it, so commands apply in the order they
/// were issued.
#[derive(Clone)]
pub struct OrderStorage {
    tx: mpsc::UnboundedSender<Command>,
}

impl OrderStorage {
    /// Spawns the owning task, it stops once every handle is dropped.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_orders(rx));

        Self { tx }
    }

    /// Returns before the write is applied.
    pub fn save(&self, order: Order) {
        self.enqueue(Command::Save(order));
    }

    /// Sees every write issued before the call.
    pub async fn get(&self, id: &str) -> Option<Order> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Command::Get {
            id: id.to_owned(),
            reply,
        });
        rx.await.ok().flatten()
    }

    /// Filters the nft out of every stored order.
    pub fn remove_nft(&self, nft_id: &str) {
        self.enqueue(Command::RemoveNft(nft_id.to_owned()));
    }

    pub fn remove_all(&self) {
        self.enqueue(Command::RemoveAll);
    }

    fn enqueue(&self, command: Command) {
        if self.tx.send(command).is_err() {
            warn!(storage = "orders", "order storage task has stopped");
        }
    }
}

async fn run_orders(mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut storage: HashMap<String, Order> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Save(order) => {
                trace!(storage = "orders", ?order, "save order");
                storage.insert(order.id.clone(), order);
            }
            Command::Get { id, reply } => {
                // the caller may be gone already, nothing to do then
                let _ = reply.send(storage.get(&id).cloned());
            }
            Command::RemoveNft(nft_id) => {
                debug!(storage = "orders", nft_id, "remove nft from every order");
                for order in storage.values_mut() {
                    order.nfts.retain(|id| *id != nft_id);
                }
            }
            Command::RemoveAll => {
                debug!(storage = "orders", "remove all orders");
                storage.clear();
            }
        }
    }

    debug!(storage = "orders", "order storage task stopped");
}

/// Single slot holding the profile of the current user.
#[derive(Clone, Default)]
pub struct ProfileStorage {
    storage: Arc<RwLock<Option<Profile>>>,
}

impl ProfileStorage {
    pub fn save(&self, profile: Profile) {
        *self.storage.write().unwrap_or_else(PoisonError::into_inner) = Some(profile);
    }

    pub fn get(&self) -> Option<Profile> {
        self.storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remove(&self) {
        self.storage
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[derive(Clone, Default)]
pub struct UsersStorage {
    storage: Arc<RwLock<Vec<User>>>,
}

impl UsersStorage {
    pub fn save(&self, users: Vec<User>) {
        *self.storage.write().unwrap_or_else(PoisonError::into_inner) = users;
    }

    pub fn get(&self) -> Vec<User> {
        self.storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
