use std::future::Future;

use serde::de::DeserializeOwned;

use crate::{
    cart::{CartOrderService, NftByIdService},
    error::Error,
    request::Request,
    service::{
        LikesService, OrdersService, PayService, ProfileService, UserNftsService, UsersService,
    },
    storage::{NftByIdStorage, OrderStorage, ProfileStorage, UsersStorage},
};

pub trait NetworkClient {
    fn send<T>(&self, request: Request) -> impl Future<Output = Result<T, Error>> + Send
    where
        T: DeserializeOwned + Send + 'static;
}

/// Storages shared by every service of one session.
#[derive(Clone)]
pub struct Storages {
    pub nfts: NftByIdStorage,
    pub orders: OrderStorage,
    pub profile: ProfileStorage,
    pub users: UsersStorage,
}

impl Storages {
    /// Must be called from within a tokio runtime: the order storage
    /// spawns its owning task.
    pub fn new() -> Self {
        Self {
            nfts: NftByIdStorage::default(),
            orders: OrderStorage::spawn(),
            profile: ProfileStorage::default(),
            users: UsersStorage::default(),
        }
    }
}

#[derive(Clone)]
pub struct Services<N>
where
    N: Clone,
{
    pub nft_by_id: NftByIdService<N>,
    pub cart: CartOrderService<N>,
    pub pay: PayService<N>,
    pub profile: ProfileService<N>,
    pub likes: LikesService<N>,
    pub orders: OrdersService<N>,
    pub users: UsersService<N>,
    pub user_nfts: UserNftsService<N>,
}

impl<N> Services<N>
where
    N: NetworkClient + Clone,
{
    pub fn new(client: N) -> Self {
        let storages = Storages::new();
        let nft_by_id = NftByIdService::new(client.clone(), storages.nfts.clone());

        Self {
            cart: CartOrderService::new(
                client.clone(),
                storages.orders.clone(),
                nft_by_id.clone(),
                storages.nfts.clone(),
            ),
            pay: PayService::new(client.clone()),
            profile: ProfileService::new(client.clone(), storages.profile.clone()),
            likes: LikesService::new(client.clone()),
            orders: OrdersService::new(client.clone()),
            users: UsersService::new(client.clone(), storages.users.clone()),
            user_nfts: UserNftsService::new(client),
            nft_by_id,
        }
    }
}
