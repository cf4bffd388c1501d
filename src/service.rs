use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::{
    error::Error,
    model::{Currency, Likes, Order, Payment, Profile, ProfileEdit, User, UserNft},
    request::Request,
    state::NetworkClient,
    storage::{ProfileStorage, UsersStorage},
};

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct PayService<N> {
    client: N,
}

impl<N> PayService<N>
where
    N: NetworkClient,
{
    pub fn new(client: N) -> Self {
        Self { client }
    }

    pub async fn currencies(&self) -> Result<Vec<Currency>> {
        trace!(service = "pay", "load currencies");
        self.client.send(Request::currencies()).await
    }

    pub async fn pay_order(&self, currency_id: &str) -> Result<Payment> {
        debug!(service = "pay", currency_id, "pay order");
        self.client.send(Request::pay(currency_id)).await
    }
}

#[derive(Clone)]
pub struct ProfileService<N> {
    client: N,
    storage: ProfileStorage,
}

impl<N> ProfileService<N>
where
    N: NetworkClient,
{
    pub fn new(client: N, storage: ProfileStorage) -> Self {
        Self { client, storage }
    }

    /// A failed load drops the cached profile, edits must not be based on
    /// a stale one.
    pub async fn load_profile(&self) -> Result<Profile> {
        trace!(service = "profile", "load profile");
        let profile: Profile = match self.client.send(Request::profile()).await {
            Ok(profile) => profile,
            Err(error) => {
                self.storage.remove();
                return Err(error);
            }
        };
        self.storage.save(profile.clone());

        Ok(profile)
    }

    /// Sends the edit only if it changes something, otherwise returns the
    /// cached profile untouched.
    pub async fn upload_profile(&self, edit: &ProfileEdit) -> Result<Profile> {
        let cached = self.current_profile()?;

        if !cached.differs_from(edit) {
            debug!(service = "profile", "profile unchanged, skip upload");
            return Ok(cached);
        }

        self.put(&cached.with_edit(edit)).await
    }

    pub fn current_profile(&self) -> Result<Profile> {
        self.storage.get().ok_or(Error::ProfileNotLoaded)
    }

    /// Unlikes the given nfts: the rest of the liked nfts stay as they are.
    pub async fn update_favourites(&self, unliked: &[String]) -> Result<Profile> {
        let cached = self.current_profile()?;

        let likes = cached
            .likes
            .iter()
            .filter(|id| !unliked.contains(id))
            .cloned()
            .collect();

        self.put(&Profile { likes, ..cached }).await
    }

    async fn put(&self, profile: &Profile) -> Result<Profile> {
        debug!(service = "profile", ?profile, "upload profile");
        let profile: Profile = self.client.send(Request::update_profile(profile)).await?;
        self.storage.save(profile.clone());

        Ok(profile)
    }
}

#[derive(Clone)]
pub struct LikesService<N> {
    client: N,
}

impl<N> LikesService<N>
where
    N: NetworkClient,
{
    pub fn new(client: N) -> Self {
        Self { client }
    }

    pub async fn likes(&self) -> Result<Likes> {
        self.client.send(Request::profile()).await
    }

    pub async fn put_likes(&self, likes: &[String]) -> Result<Likes> {
        trace!(service = "likes", ?likes, "put likes");
        self.client.send(Request::put_likes(likes)).await
    }
}

#[derive(Clone)]
pub struct OrdersService<N> {
    client: N,
}

impl<N> OrdersService<N>
where
    N: NetworkClient,
{
    pub fn new(client: N) -> Self {
        Self { client }
    }

    pub async fn orders(&self) -> Result<Order> {
        self.client.send(Request::order()).await
    }

    pub async fn put_orders(&self, nfts: &[String]) -> Result<Order> {
        trace!(service = "orders", ?nfts, "put orders");
        self.client.send(Request::change_order(nfts)).await
    }
}

#[derive(Clone)]
pub struct UsersService<N> {
    client: N,
    storage: UsersStorage,
}

impl<N> UsersService<N>
where
    N: NetworkClient,
{
    pub fn new(client: N, storage: UsersStorage) -> Self {
        Self { client, storage }
    }

    pub async fn load_users(&self) -> Result<Vec<User>> {
        let users: Vec<User> = self.client.send(Request::users()).await?;
        debug!(service = "users", count = users.len(), "users loaded");
        self.storage.save(users.clone());

        Ok(users)
    }

    /// Looks into the loaded user list first.
    pub async fn load_user(&self, id: &str) -> Result<User> {
        if let Some(user) = self.storage.get().into_iter().find(|user| user.id == id) {
            trace!(service = "users", id, "user found in the list");
            return Ok(user);
        }

        self.client.send(Request::user(id)).await
    }
}

#[derive(Clone)]
pub struct UserNftsService<N> {
    client: N,
}

impl<N> UserNftsService<N> {
    pub fn new(client: N) -> Self {
        Self { client }
    }
}

impl<N> UserNftsService<N>
where
    N: NetworkClient + Clone + Send + Sync + 'static,
{
    pub async fn load_user_nft(&self, id: &str) -> Result<UserNft> {
        self.client.send(Request::nft_by_id(id)).await
    }

    /// Loads every nft concurrently, keeps the order of `ids`. The first
    /// failure fails the whole call.
    pub async fn load_nfts(&self, ids: &[String]) -> Result<Vec<UserNft>> {
        let mut tasks = JoinSet::new();
        for (position, id) in ids.iter().cloned().enumerate() {
            let service = self.clone();
            tasks.spawn(async move { (position, service.load_user_nft(&id).await) });
        }

        let mut nfts = Vec::with_capacity(ids.len());
        while let Some(joined) = tasks.join_next().await {
            let (position, result) = joined?;
            match result {
                Ok(nft) => nfts.push((position, nft)),
                Err(error) => {
                    tasks.abort_all();
                    return Err(error);
                }
            }
        }

        nfts.sort_by_key(|(position, _)| *position);
        Ok(nfts.into_iter().map(|(_, nft)| nft).collect())
    }
}
