use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    client::cancellable,
    error::Error,
    model::{Nft, Order},
    request::Request,
    state::NetworkClient,
    storage::{NftByIdStorage, OrderStorage},
};

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct NftByIdService<N> {
    client: N,
    storage: NftByIdStorage,
}

impl<N> NftByIdService<N> {
    pub fn new(client: N, storage: NftByIdStorage) -> Self {
        Self { client, storage }
    }
}

impl<N> NftByIdService<N>
where
    N: NetworkClient,
{
    /// Cache first, the network is asked only on a miss.
    pub async fn load_nft(&self, id: &str) -> Result<Nft> {
        if let Some(nft) = self.storage.get(id) {
            trace!(service = "nft", id, "nft found in cache");
            return Ok(nft);
        }

        trace!(service = "nft", id, "load nft from api");
        let nft: Nft = self.client.send(Request::nft_by_id(id)).await?;
        self.storage.save(nft.clone());

        Ok(nft)
    }
}

impl<N> NftByIdService<N>
where
    N: NetworkClient + Clone + Send + Sync + 'static,
{
    /// Loads every nft concurrently, keeping the order of `ids`. The first
    /// failure or a cancellation aborts the rest.
    pub async fn load_all(&self, ids: &[String], cancel: &CancellationToken) -> Result<Vec<Nft>> {
        let mut tasks = JoinSet::new();
        for (position, id) in ids.iter().cloned().enumerate() {
            let service = self.clone();
            tasks.spawn(async move { (position, service.load_nft(&id).await) });
        }

        let mut nfts = Vec::with_capacity(ids.len());
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(Error::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            match joined {
                None => break,
                Some(joined) => {
                    let (position, result) = joined?;
                    match result {
                        Ok(nft) => nfts.push((position, nft)),
                        Err(error) => {
                            tasks.abort_all();
                            return Err(error);
                        }
                    }
                }
            }
        }

        nfts.sort_by_key(|(position, _)| *position);
        Ok(nfts.into_iter().map(|(_, nft)| nft).collect())
    }
}

#[derive(Default)]
struct CartContent {
    order_id: Option<String>,
    nfts: Vec<Nft>,
}

/// Keeps the local cart consistent with the remote order.
#[derive(Clone)]
pub struct CartOrderService<N> {
    client: N,
    orders: OrderStorage,
    nft_service: NftByIdService<N>,
    nft_storage: NftByIdStorage,
    content: Arc<Mutex<CartContent>>,
}

impl<N> CartOrderService<N> {
    pub fn new(
        client: N,
        orders: OrderStorage,
        nft_service: NftByIdService<N>,
        nft_storage: NftByIdStorage,
    ) -> Self {
        Self {
            client,
            orders,
            nft_service,
            nft_storage,
            content: Arc::default(),
        }
    }

    /// Resolved nfts of the cart.
    pub fn nfts(&self) -> Vec<Nft> {
        self.lock().nfts.clone()
    }

    /// Ids of the cart in the order the api lists them, as kept by the
    /// order storage. Empty until an order is loaded.
    pub async fn ids(&self) -> Vec<String> {
        let order_id = self.lock().order_id.clone();
        match order_id {
            Some(order_id) => self
                .orders
                .get(&order_id)
                .await
                .map(|order| order.nfts)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CartContent> {
        self.content.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<N> CartOrderService<N>
where
    N: NetworkClient + Clone + Send + Sync + 'static,
{
    /// Loads the order and every nft of it. Returns once all nfts are
    /// resolved; nfts that did load are kept even if others failed.
    pub async fn load_order(&self, cancel: &CancellationToken) -> Result<Order> {
        let order: Order = cancellable(cancel, self.client.send(Request::order())).await?;
        debug!(
            service = "cart",
            order_id = order.id,
            nfts = order.nfts.len(),
            "order loaded"
        );

        self.orders.save(order.clone());

        let mut tasks = JoinSet::new();
        for (position, id) in order.nfts.iter().cloned().enumerate() {
            let service = self.nft_service.clone();
            tasks.spawn(async move {
                let result = service.load_nft(&id).await;
                (position, id, result)
            });
        }

        let mut resolved = Vec::with_capacity(order.nfts.len());
        let mut failed = Vec::new();
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(service = "cart", "order loading cancelled");
                    tasks.abort_all();
                    return Err(Error::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            match joined {
                None => break,
                Some(Ok((position, _, Ok(nft)))) => resolved.push((position, nft)),
                Some(Ok((position, id, Err(error)))) => {
                    warn!(service = "cart", id, %error, "cannot load nft of the order");
                    failed.push((position, id));
                }
                Some(Err(error)) => return Err(error.into()),
            }
        }

        resolved.sort_by_key(|(position, _)| *position);
        let mut seen = HashSet::new();
        let nfts: Vec<Nft> = resolved
            .into_iter()
            .map(|(_, nft)| nft)
            .filter(|nft| seen.insert(nft.id.clone()))
            .collect();

        {
            let mut content = self.lock();
            content.order_id = Some(order.id.clone());
            content.nfts = nfts;
        }

        if !failed.is_empty() {
            failed.sort();
            return Err(Error::PartialCart {
                failed: failed.into_iter().map(|(_, id)| id).collect(),
            });
        }

        Ok(order)
    }

    /// Removes one nft from the cart. The cache entry is evicted before the
    /// api confirms and restored if the api call fails.
    pub async fn remove_nft(&self, id: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        let evicted = self.nft_storage.remove(id);

        let remaining: Vec<String> = self
            .ids()
            .await
            .into_iter()
            .filter(|other| other != id)
            .collect();

        trace!(service = "cart", id, ?remaining, "change order");
        let result: Result<Order> =
            cancellable(cancel, self.client.send(Request::change_order(&remaining))).await;

        match result {
            Ok(order) => {
                self.lock().nfts.retain(|nft| nft.id != id);
                self.nft_storage.remove(id);
                self.orders.remove_nft(id);

                debug!(service = "cart", id, "nft removed from order");
                Ok(order.nfts)
            }
            Err(error) => {
                if let Some(nft) = evicted {
                    trace!(service = "cart", id, "restore evicted nft");
                    self.nft_storage.save(nft);
                }
                Err(error)
            }
        }
    }

    /// Empties the order. Returns how many nfts the api still reports.
    pub async fn remove_all(&self, cancel: &CancellationToken) -> Result<usize> {
        let order: Order =
            cancellable(cancel, self.client.send(Request::change_order(&[]))).await?;

        self.lock().nfts.clear();
        self.nft_storage.remove_all();
        self.orders.remove_all();

        debug!(service = "cart", remaining = order.nfts.len(), "order emptied");
        Ok(order.nfts.len())
    }
}
