use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    cart::NftByIdService,
    error::{ErrorKind, ErrorModel},
    filter::CollectionSort,
    model::Nft,
    state::NetworkClient,
};

use super::{Executor, Machine, View};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileNftsPhase {
    Initial,
    Loading,
    Ready,
    Failed(ErrorKind),
}

/// One of the profile collections, "My NFT" or "Favourite NFT". Holds the
/// ids taken from the profile and the nfts loaded for them.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileNftsPresenter {
    pub phase: ProfileNftsPhase,
    pub ids: Vec<String>,
    pub nfts: Vec<Nft>,
    pub sort: Option<CollectionSort>,
}

#[derive(Debug)]
pub enum ProfileNftsEvent {
    ViewLoaded,
    Retry,
    Loaded(Vec<Nft>),
    LoadFailed(ErrorKind),
    SortSelected(CollectionSort),
}

#[derive(Debug, PartialEq)]
pub enum ProfileNftsEffect {
    LoadNfts(Vec<String>),
    Render(ProfileNftsView),
    ShowError(ErrorModel),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProfileNftsView {
    pub items: Vec<Nft>,
    pub loading: bool,
    pub empty: bool,
}

impl ProfileNftsPresenter {
    pub fn new(ids: Vec<String>, sort: Option<CollectionSort>) -> Self {
        Self {
            phase: ProfileNftsPhase::Initial,
            ids,
            nfts: Vec::new(),
            sort,
        }
    }

    pub fn view(&self) -> ProfileNftsView {
        let loading = self.phase == ProfileNftsPhase::Loading;

        ProfileNftsView {
            items: self.nfts.clone(),
            loading,
            empty: self.phase == ProfileNftsPhase::Ready && self.nfts.is_empty(),
        }
    }

    fn with_phase(self, phase: ProfileNftsPhase) -> Self {
        Self { phase, ..self }
    }

    fn render(self, mut effects: Vec<ProfileNftsEffect>) -> (Self, Vec<ProfileNftsEffect>) {
        effects.insert(0, ProfileNftsEffect::Render(self.view()));
        (self, effects)
    }

    fn load(self) -> (Self, Vec<ProfileNftsEffect>) {
        // an empty collection needs no request
        if self.ids.is_empty() {
            return self.with_phase(ProfileNftsPhase::Ready).render(vec![]);
        }
        let ids = self.ids.clone();
        self.with_phase(ProfileNftsPhase::Loading)
            .render(vec![ProfileNftsEffect::LoadNfts(ids)])
    }
}

impl Machine for ProfileNftsPresenter {
    type Event = ProfileNftsEvent;
    type Effect = ProfileNftsEffect;

    fn transition(self, event: ProfileNftsEvent) -> (Self, Vec<ProfileNftsEffect>) {
        use ProfileNftsEvent::*;
        use ProfileNftsPhase::*;

        match (self.phase, event) {
            (Initial, ViewLoaded) | (Failed(_), ViewLoaded | Retry) => self.load(),
            (Loading, Loaded(mut nfts)) => {
                if let Some(sort) = self.sort {
                    sort.sort(&mut nfts);
                }
                Self { nfts, ..self }.with_phase(Ready).render(vec![])
            }
            (Loading, LoadFailed(kind)) => self
                .with_phase(Failed(kind))
                .render(vec![ProfileNftsEffect::ShowError(ErrorModel::retryable(kind))]),
            (_, SortSelected(sort)) => {
                let mut nfts = self.nfts;
                sort.sort(&mut nfts);
                Self {
                    nfts,
                    sort: Some(sort),
                    ..self
                }
                .render(vec![])
            }
            (_, event) => {
                debug!(presenter = "profile_nfts", phase = ?self.phase, ?event, "event ignored");
                (self, vec![])
            }
        }
    }
}

pub struct ProfileNftsScreen<N, V> {
    pub nfts: NftByIdService<N>,
    pub view: V,
    pub cancel: CancellationToken,
}

impl<N, V> Executor<ProfileNftsPresenter> for ProfileNftsScreen<N, V>
where
    N: NetworkClient + Clone + Send + Sync + 'static,
    V: View,
{
    async fn execute(&self, effect: ProfileNftsEffect) -> Option<ProfileNftsEvent> {
        match effect {
            ProfileNftsEffect::LoadNfts(ids) => {
                Some(match self.nfts.load_all(&ids, &self.cancel).await {
                    Ok(nfts) => ProfileNftsEvent::Loaded(nfts),
                    Err(error) => {
                        error!("{}", error);
                        ProfileNftsEvent::LoadFailed(error.kind())
                    }
                })
            }
            ProfileNftsEffect::Render(nfts) => {
                self.view.render_profile_nfts(&nfts);
                None
            }
            ProfileNftsEffect::ShowError(model) => {
                self.view.show_error(&model);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        model::fixtures,
        presenter::{drive, testing::RecordingView},
        state::Services,
        testing::MockApi,
    };

    fn nfts() -> Vec<Nft> {
        vec![
            fixtures::nft("a", "beta", 3.0, 2),
            fixtures::nft("c", "Alpha", 1.0, 5),
            fixtures::nft("d", "gamma", 2.0, 4),
        ]
    }

    fn names(presenter: &ProfileNftsPresenter) -> Vec<&str> {
        presenter.nfts.iter().map(|nft| nft.name.as_str()).collect()
    }

    fn likes() -> Vec<String> {
        fixtures::profile().likes
    }

    #[test]
    fn loaded_collection_is_sorted() {
        let presenter = ProfileNftsPresenter::new(likes(), Some(CollectionSort::Name));

        let (presenter, effects) = presenter.transition(ProfileNftsEvent::ViewLoaded);
        assert_eq!(presenter.phase, ProfileNftsPhase::Loading);
        assert!(matches!(&effects[0], ProfileNftsEffect::Render(view) if view.loading));
        assert_eq!(effects[1], ProfileNftsEffect::LoadNfts(likes()));

        let (presenter, _) = presenter.transition(ProfileNftsEvent::Loaded(nfts()));
        assert_eq!(names(&presenter), vec!["Alpha", "beta", "gamma"]);

        let (presenter, _) =
            presenter.transition(ProfileNftsEvent::SortSelected(CollectionSort::Price));
        assert_eq!(names(&presenter), vec!["Alpha", "gamma", "beta"]);

        let (presenter, effects) =
            presenter.transition(ProfileNftsEvent::SortSelected(CollectionSort::Rating));
        assert_eq!(names(&presenter), vec!["Alpha", "gamma", "beta"]);
        assert!(matches!(&effects[0], ProfileNftsEffect::Render(view) if view.items.len() == 3));
    }

    #[test]
    fn empty_collection_skips_loading() {
        let (presenter, effects) =
            ProfileNftsPresenter::new(vec![], None).transition(ProfileNftsEvent::ViewLoaded);

        assert_eq!(presenter.phase, ProfileNftsPhase::Ready);
        assert_eq!(effects.len(), 1);
        assert!(presenter.view().empty);
    }

    #[test]
    fn failed_load_can_be_retried() {
        let presenter = ProfileNftsPresenter::new(likes(), None);

        let (presenter, effects) = presenter.transition(ProfileNftsEvent::Retry);
        assert!(effects.is_empty());

        let (presenter, _) = presenter.transition(ProfileNftsEvent::ViewLoaded);
        let (presenter, effects) =
            presenter.transition(ProfileNftsEvent::LoadFailed(ErrorKind::Network));
        assert_eq!(presenter.phase, ProfileNftsPhase::Failed(ErrorKind::Network));
        assert_eq!(
            effects[1],
            ProfileNftsEffect::ShowError(ErrorModel::retryable(ErrorKind::Network))
        );
        assert!(!presenter.view().empty);

        let (presenter, effects) = presenter.transition(ProfileNftsEvent::Retry);
        assert_eq!(presenter.phase, ProfileNftsPhase::Loading);
        assert_eq!(effects[1], ProfileNftsEffect::LoadNfts(likes()));
    }

    #[tokio::test]
    async fn drive_favourites() {
        let api = MockApi::default();
        for nft in nfts() {
            api.reply(
                Method::GET,
                &format!("/api/v1/nft/{}", nft.id),
                serde_json::to_value(&nft).unwrap(),
            );
        }

        let services = Services::new(api.clone());
        let screen = ProfileNftsScreen {
            nfts: services.nft_by_id.clone(),
            view: RecordingView::default(),
            cancel: CancellationToken::new(),
        };

        let (tx, rx) = mpsc::channel(2);
        tx.send(ProfileNftsEvent::ViewLoaded).await.unwrap();
        tx.send(ProfileNftsEvent::SortSelected(CollectionSort::Price))
            .await
            .unwrap();
        drop(tx);

        let presenter = drive(
            ProfileNftsPresenter::new(likes(), None),
            &screen,
            rx,
            &CancellationToken::new(),
        )
        .await
        .into_inner();

        assert_eq!(presenter.phase, ProfileNftsPhase::Ready);
        assert_eq!(names(&presenter), vec!["Alpha", "gamma", "beta"]);
        assert_eq!(api.requests().len(), 3);
        let rendered = screen.view.profile_nfts.lock().unwrap();
        assert!(rendered.first().unwrap().loading);
        assert_eq!(rendered.last().unwrap().items.len(), 3);
    }

    #[tokio::test]
    async fn drive_failed_collection() {
        let api = MockApi::default();
        api.reply(
            Method::GET,
            "/api/v1/nft/a",
            serde_json::to_value(&nfts()[0]).unwrap(),
        );

        let services = Services::new(api);
        let screen = ProfileNftsScreen {
            nfts: services.nft_by_id.clone(),
            view: RecordingView::default(),
            cancel: CancellationToken::new(),
        };

        let (tx, rx) = mpsc::channel(1);
        tx.send(ProfileNftsEvent::ViewLoaded).await.unwrap();
        drop(tx);

        let presenter = drive(
            ProfileNftsPresenter::new(likes(), Some(CollectionSort::Name)),
            &screen,
            rx,
            &CancellationToken::new(),
        )
        .await
        .into_inner();

        assert!(matches!(presenter.phase, ProfileNftsPhase::Failed(_)));
        assert!(presenter.nfts.is_empty());
        assert!(screen.view.errors.lock().unwrap()[0].action.is_some());
    }
}
