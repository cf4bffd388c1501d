use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    client::cancellable,
    error::{Error, ErrorKind, ErrorModel},
    model::{Price, UserNft},
    service::{LikesService, OrdersService, UserNftsService},
    state::NetworkClient,
};

use super::{Executor, Machine, View};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserNftsPhase {
    Initial,
    Loading,
    Ready,
    Saving,
    Failed(ErrorKind),
}

/// Everything the screen needs before it can show a single cell.
#[derive(Clone, Debug, PartialEq)]
pub struct UserNftsData {
    pub nfts: Vec<UserNft>,
    pub likes: Vec<String>,
    pub basket: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserNftsPresenter {
    pub phase: UserNftsPhase,
    pub nft_ids: Vec<String>,
    pub data: Option<UserNftsData>,
}

#[derive(Debug)]
pub enum UserNftsEvent {
    ViewLoaded,
    Retry,
    Loaded(UserNftsData),
    LoadFailed(ErrorKind),
    LikeToggled(String),
    BasketToggled(String),
    LikesSaved(Vec<String>),
    BasketSaved(Vec<String>),
    SaveFailed(ErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum UserNftsEffect {
    /// Nfts of the user, likes and the basket, fetched together.
    Load(Vec<String>),
    PutLikes(Vec<String>),
    PutOrders(Vec<String>),
    Render(UserNftsView),
    ShowError(ErrorModel),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NftCell {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: Price,
    pub rating: u8,
    pub liked: bool,
    pub in_basket: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserNftsView {
    pub cells: Vec<NftCell>,
    pub loading: bool,
}

impl UserNftsPresenter {
    pub fn new(nft_ids: Vec<String>) -> Self {
        Self {
            phase: UserNftsPhase::Initial,
            nft_ids,
            data: None,
        }
    }

    pub fn view(&self) -> UserNftsView {
        let loading = matches!(self.phase, UserNftsPhase::Loading | UserNftsPhase::Saving);
        let Some(data) = &self.data else {
            return UserNftsView {
                cells: Vec::new(),
                loading,
            };
        };

        let cells = data
            .nfts
            .iter()
            .map(|nft| NftCell {
                id: nft.id.clone(),
                name: nft.name.clone(),
                image: nft.images.first().cloned(),
                price: nft.price,
                rating: nft.rating.get(),
                liked: data.likes.contains(&nft.id),
                in_basket: data.basket.contains(&nft.id),
            })
            .collect();

        UserNftsView { cells, loading }
    }

    fn with_phase(self, phase: UserNftsPhase) -> Self {
        Self { phase, ..self }
    }

    fn render(self, mut effects: Vec<UserNftsEffect>) -> (Self, Vec<UserNftsEffect>) {
        effects.insert(0, UserNftsEffect::Render(self.view()));
        (self, effects)
    }

    fn shows(&self, id: &str) -> bool {
        self.data
            .as_ref()
            .is_some_and(|data| data.nfts.iter().any(|nft| nft.id == id))
    }

    fn update(self, apply: impl FnOnce(&mut UserNftsData)) -> Self {
        let data = self.data.map(|mut data| {
            apply(&mut data);
            data
        });
        Self { data, ..self }
    }
}

fn toggled(ids: &[String], id: String) -> Vec<String> {
    if ids.contains(&id) {
        ids.iter().filter(|other| **other != id).cloned().collect()
    } else {
        let mut ids = ids.to_vec();
        ids.push(id);
        ids
    }
}

impl Machine for UserNftsPresenter {
    type Event = UserNftsEvent;
    type Effect = UserNftsEffect;

    fn transition(self, event: UserNftsEvent) -> (Self, Vec<UserNftsEffect>) {
        use UserNftsEvent::*;
        use UserNftsPhase::*;

        match (self.phase, event) {
            (Initial, ViewLoaded) | (Failed(_), ViewLoaded | Retry) => {
                let ids = self.nft_ids.clone();
                self.with_phase(Loading)
                    .render(vec![UserNftsEffect::Load(ids)])
            }
            (Loading, Loaded(data)) => Self {
                data: Some(data),
                ..self
            }
            .with_phase(Ready)
            .render(vec![]),
            (Loading, LoadFailed(kind)) => self
                .with_phase(Failed(kind))
                .render(vec![UserNftsEffect::ShowError(ErrorModel::retryable(kind))]),
            (Ready, LikeToggled(id)) if self.shows(&id) => {
                let likes = self
                    .data
                    .as_ref()
                    .map(|data| toggled(&data.likes, id))
                    .unwrap_or_default();
                self.with_phase(Saving)
                    .render(vec![UserNftsEffect::PutLikes(likes)])
            }
            (Ready, BasketToggled(id)) if self.shows(&id) => {
                let basket = self
                    .data
                    .as_ref()
                    .map(|data| toggled(&data.basket, id))
                    .unwrap_or_default();
                self.with_phase(Saving)
                    .render(vec![UserNftsEffect::PutOrders(basket)])
            }
            (Saving, LikesSaved(likes)) => self
                .update(|data| data.likes = likes)
                .with_phase(Ready)
                .render(vec![]),
            (Saving, BasketSaved(basket)) => self
                .update(|data| data.basket = basket)
                .with_phase(Ready)
                .render(vec![]),
            (Saving, SaveFailed(kind)) => self
                .with_phase(Ready)
                .render(vec![UserNftsEffect::ShowError(ErrorModel::notice(kind))]),
            (_, event) => {
                debug!(presenter = "user_nfts", phase = ?self.phase, ?event, "event ignored");
                (self, vec![])
            }
        }
    }
}

pub struct UserNftsScreen<N, V> {
    pub nfts: UserNftsService<N>,
    pub likes: LikesService<N>,
    pub orders: OrdersService<N>,
    pub view: V,
    pub cancel: CancellationToken,
}

impl<N, V> UserNftsScreen<N, V>
where
    N: NetworkClient + Clone + Send + Sync + 'static,
{
    async fn load(&self, ids: &[String]) -> Result<UserNftsData, Error> {
        let (nfts, likes, order) = tokio::try_join!(
            self.nfts.load_nfts(ids),
            self.likes.likes(),
            self.orders.orders(),
        )?;

        Ok(UserNftsData {
            nfts,
            likes: likes.likes,
            basket: order.nfts,
        })
    }
}

impl<N, V> Executor<UserNftsPresenter> for UserNftsScreen<N, V>
where
    N: NetworkClient + Clone + Send + Sync + 'static,
    V: View,
{
    async fn execute(&self, effect: UserNftsEffect) -> Option<UserNftsEvent> {
        match effect {
            UserNftsEffect::Load(ids) => {
                Some(match cancellable(&self.cancel, self.load(&ids)).await {
                    Ok(data) => UserNftsEvent::Loaded(data),
                    Err(error) => {
                        error!("{}", error);
                        UserNftsEvent::LoadFailed(error.kind())
                    }
                })
            }
            UserNftsEffect::PutLikes(likes) => Some(
                match cancellable(&self.cancel, self.likes.put_likes(&likes)).await {
                    Ok(saved) => UserNftsEvent::LikesSaved(saved.likes),
                    Err(error) => {
                        error!("{}", error);
                        UserNftsEvent::SaveFailed(error.kind())
                    }
                },
            ),
            UserNftsEffect::PutOrders(basket) => Some(
                match cancellable(&self.cancel, self.orders.put_orders(&basket)).await {
                    Ok(order) => UserNftsEvent::BasketSaved(order.nfts),
                    Err(error) => {
                        error!("{}", error);
                        UserNftsEvent::SaveFailed(error.kind())
                    }
                },
            ),
            UserNftsEffect::Render(nfts) => {
                self.view.render_user_nfts(&nfts);
                None
            }
            UserNftsEffect::ShowError(model) => {
                self.view.show_error(&model);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Method;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        presenter::{drive, testing::RecordingView},
        state::Services,
        testing::MockApi,
    };

    fn user_nft(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": id,
            "images": [format!("https://{}.test", id)],
            "price": 2.0,
            "rating": 4
        })
    }

    fn data() -> UserNftsData {
        UserNftsData {
            nfts: vec![
                serde_json::from_value(user_nft("a")).unwrap(),
                serde_json::from_value(user_nft("b")).unwrap(),
            ],
            likes: vec!["a".to_owned()],
            basket: vec![],
        }
    }

    fn ready() -> UserNftsPresenter {
        let presenter = UserNftsPresenter::new(vec!["a".to_owned(), "b".to_owned()]);
        let (presenter, _) = presenter.transition(UserNftsEvent::ViewLoaded);
        let (presenter, _) = presenter.transition(UserNftsEvent::Loaded(data()));
        presenter
    }

    #[test]
    fn nothing_shown_until_loaded() {
        let presenter = UserNftsPresenter::new(vec!["a".to_owned()]);

        // nothing failed, nothing to retry
        let (presenter, effects) = presenter.transition(UserNftsEvent::Retry);
        assert!(effects.is_empty());

        let (presenter, effects) = presenter.transition(UserNftsEvent::ViewLoaded);

        assert_eq!(effects[1], UserNftsEffect::Load(vec!["a".to_owned()]));
        assert!(presenter.view().cells.is_empty());
        assert!(presenter.view().loading);
    }

    #[test]
    fn cells_reflect_likes_and_basket() {
        let view = ready().view();

        assert_eq!(view.cells.len(), 2);
        assert!(view.cells[0].liked);
        assert!(!view.cells[1].liked);
        assert!(!view.cells[0].in_basket);
        assert_eq!(view.cells[0].image.as_deref(), Some("https://a.test"));
        assert_eq!(view.cells[0].rating, 4);
    }

    #[test]
    fn toggles_put_new_lists() {
        let (presenter, effects) = ready().transition(UserNftsEvent::LikeToggled("a".to_owned()));
        assert_eq!(effects[1], UserNftsEffect::PutLikes(vec![]));

        // one change at a time
        let (presenter, effects) =
            presenter.transition(UserNftsEvent::BasketToggled("b".to_owned()));
        assert!(effects.is_empty());

        let (presenter, _) = presenter.transition(UserNftsEvent::LikesSaved(vec![]));
        let (presenter, effects) =
            presenter.transition(UserNftsEvent::BasketToggled("b".to_owned()));
        assert_eq!(effects[1], UserNftsEffect::PutOrders(vec!["b".to_owned()]));

        let (presenter, _) = presenter.transition(UserNftsEvent::BasketSaved(vec!["b".to_owned()]));
        let view = presenter.view();
        assert!(!view.cells[0].liked);
        assert!(view.cells[1].in_basket);
    }

    #[test]
    fn unknown_nft_toggle_is_ignored() {
        let (presenter, effects) = ready().transition(UserNftsEvent::LikeToggled("z".to_owned()));

        assert!(effects.is_empty());
        assert_eq!(presenter.phase, UserNftsPhase::Ready);
    }

    #[test]
    fn failed_save_keeps_lists() {
        let (presenter, _) = ready().transition(UserNftsEvent::LikeToggled("b".to_owned()));

        let (presenter, effects) =
            presenter.transition(UserNftsEvent::SaveFailed(ErrorKind::Network));

        assert_eq!(presenter.data, Some(data()));
        assert_eq!(
            effects[1],
            UserNftsEffect::ShowError(ErrorModel::notice(ErrorKind::Network))
        );
    }

    #[tokio::test]
    async fn drive_waits_for_all_data() {
        let api = MockApi::default();
        api.reply(Method::GET, "/api/v1/nft/a", user_nft("a"));
        api.reply_after(
            Method::GET,
            "/api/v1/nft/b",
            user_nft("b"),
            Duration::from_millis(20),
        );
        api.reply_after(
            Method::GET,
            "/api/v1/profile/1",
            json!({ "likes": ["b"] }),
            Duration::from_millis(10),
        );
        api.reply(Method::GET, "/api/v1/orders/1", json!({ "id": "1", "nfts": ["a"] }));
        api.reply(Method::PUT, "/api/v1/profile/1", json!({ "likes": ["b", "a"] }));

        let services = Services::new(api.clone());
        let screen = UserNftsScreen {
            nfts: services.user_nfts.clone(),
            likes: services.likes.clone(),
            orders: services.orders.clone(),
            view: RecordingView::default(),
            cancel: CancellationToken::new(),
        };

        let (tx, rx) = mpsc::channel(2);
        tx.send(UserNftsEvent::ViewLoaded).await.unwrap();
        tx.send(UserNftsEvent::LikeToggled("a".to_owned()))
            .await
            .unwrap();
        drop(tx);

        let presenter = drive(
            UserNftsPresenter::new(vec!["a".to_owned(), "b".to_owned()]),
            &screen,
            rx,
            &CancellationToken::new(),
        )
        .await
        .into_inner();

        let renders = screen.view.user_nfts.lock().unwrap();
        assert!(renders[0].cells.is_empty());
        assert_eq!(renders[1].cells.len(), 2);
        assert!(renders[1].cells[0].in_basket);
        assert!(renders[1].cells[1].liked);

        assert_eq!(presenter.data.unwrap().likes, vec!["b".to_owned(), "a".to_owned()]);
        let form = api.requests().pop().unwrap().form.unwrap();
        assert_eq!(form, "likes=b&likes=a");
    }

    #[tokio::test]
    async fn drive_failed_load() {
        let api = MockApi::default();
        api.reply(Method::GET, "/api/v1/nft/a", user_nft("a"));
        api.reply(Method::GET, "/api/v1/orders/1", json!({ "id": "1", "nfts": [] }));

        let services = Services::new(api);
        let screen = UserNftsScreen {
            nfts: services.user_nfts.clone(),
            likes: services.likes.clone(),
            orders: services.orders.clone(),
            view: RecordingView::default(),
            cancel: CancellationToken::new(),
        };

        let (tx, rx) = mpsc::channel(1);
        tx.send(UserNftsEvent::ViewLoaded).await.unwrap();
        drop(tx);

        let presenter = drive(
            UserNftsPresenter::new(vec!["a".to_owned()]),
            &screen,
            rx,
            &CancellationToken::new(),
        )
        .await
        .into_inner();

        assert_eq!(presenter.phase, UserNftsPhase::Failed(ErrorKind::Network));
        assert!(presenter.data.is_none());
        assert_eq!(
            *screen.view.errors.lock().unwrap(),
            vec![ErrorModel::retryable(ErrorKind::Network)]
        );
    }
}
