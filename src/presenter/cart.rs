use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    cart::CartOrderService,
    error::{Error, ErrorKind, ErrorModel},
    filter::SortKey,
    model::{Nft, Price},
    prefs::Preferences,
    state::NetworkClient,
};

use super::{Executor, Machine, View};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartPhase {
    Initial,
    Loading,
    Ready,
    Failed(ErrorKind),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CartPresenter {
    pub phase: CartPhase,
    pub content: Vec<Nft>,
    pub sort: SortKey,
}

#[derive(Debug)]
pub enum CartEvent {
    ViewLoaded,
    Retry,
    OrderLoaded(Vec<Nft>),
    LoadFailed(ErrorKind),
    SortSelected(SortKey),
    RemoveRequested(String),
    NftRemoved(String),
    RemoveFailed(ErrorKind),
    ClearRequested,
    CartCleared,
}

#[derive(Debug, PartialEq)]
pub enum CartEffect {
    LoadOrder,
    RemoveNft(String),
    ClearCart,
    PersistSort(SortKey),
    Render(CartView),
    ShowError(ErrorModel),
}

/// What the cart screen shows.
#[derive(Clone, Debug, PartialEq)]
pub struct CartView {
    pub items: Vec<Nft>,
    pub count: usize,
    pub total_price: Price,
    pub loading: bool,
    pub empty: bool,
}

impl CartPresenter {
    pub fn new(sort: SortKey) -> Self {
        Self {
            phase: CartPhase::Initial,
            content: Vec::new(),
            sort,
        }
    }

    pub fn view(&self) -> CartView {
        let loading = self.phase == CartPhase::Loading;

        CartView {
            items: self.content.clone(),
            count: self.content.len(),
            total_price: self.content.iter().map(|nft| nft.price).sum(),
            loading,
            empty: !loading && self.content.is_empty(),
        }
    }

    fn with_phase(self, phase: CartPhase) -> Self {
        Self { phase, ..self }
    }

    fn render(self, mut effects: Vec<CartEffect>) -> (Self, Vec<CartEffect>) {
        effects.insert(0, CartEffect::Render(self.view()));
        (self, effects)
    }
}

impl Machine for CartPresenter {
    type Event = CartEvent;
    type Effect = CartEffect;

    fn transition(self, event: CartEvent) -> (Self, Vec<CartEffect>) {
        use CartEvent::*;

        match event {
            ViewLoaded if self.phase == CartPhase::Loading => (self, vec![]),
            Retry if !matches!(self.phase, CartPhase::Failed(_)) => (self, vec![]),
            ViewLoaded | Retry => Self {
                phase: CartPhase::Loading,
                content: Vec::new(),
                ..self
            }
            .render(vec![CartEffect::LoadOrder]),
            OrderLoaded(mut content) => {
                self.sort.sort(&mut content);
                Self { content, ..self }
                    .with_phase(CartPhase::Ready)
                    .render(vec![])
            }
            LoadFailed(kind) => self
                .with_phase(CartPhase::Failed(kind))
                .render(vec![CartEffect::ShowError(ErrorModel::retryable(kind))]),
            SortSelected(sort) => {
                let mut content = self.content;
                sort.sort(&mut content);
                Self {
                    content,
                    sort,
                    ..self
                }
                .render(vec![CartEffect::PersistSort(sort)])
            }
            RemoveRequested(id) => {
                let removable = self.phase == CartPhase::Ready
                    && self.content.iter().any(|nft| nft.id == id);
                if !removable {
                    return (self, vec![]);
                }
                self.with_phase(CartPhase::Loading)
                    .render(vec![CartEffect::RemoveNft(id)])
            }
            NftRemoved(id) => {
                let mut content = self.content;
                content.retain(|nft| nft.id != id);
                Self { content, ..self }
                    .with_phase(CartPhase::Ready)
                    .render(vec![])
            }
            RemoveFailed(kind) => self
                .with_phase(CartPhase::Ready)
                .render(vec![CartEffect::ShowError(ErrorModel::notice(kind))]),
            ClearRequested if self.phase != CartPhase::Ready => (self, vec![]),
            ClearRequested => self
                .with_phase(CartPhase::Loading)
                .render(vec![CartEffect::ClearCart]),
            CartCleared => Self {
                content: Vec::new(),
                ..self
            }
            .with_phase(CartPhase::Ready)
            .render(vec![]),
        }
    }
}

/// Executes cart effects against the services of a session.
pub struct CartScreen<N, V> {
    pub cart: CartOrderService<N>,
    pub prefs: Preferences,
    pub view: V,
    pub cancel: CancellationToken,
}

impl<N, V> Executor<CartPresenter> for CartScreen<N, V>
where
    N: NetworkClient + Clone + Send + Sync + 'static,
    V: View,
{
    async fn execute(&self, effect: CartEffect) -> Option<CartEvent> {
        match effect {
            CartEffect::LoadOrder => Some(match self.cart.load_order(&self.cancel).await {
                Ok(_) => CartEvent::OrderLoaded(self.cart.nfts()),
                // show what did load, the failure is reported by the log
                Err(Error::PartialCart { failed }) => {
                    warn!(?failed, "cart is shown without some nfts");
                    CartEvent::OrderLoaded(self.cart.nfts())
                }
                Err(error) => {
                    error!("{}", error);
                    CartEvent::LoadFailed(error.kind())
                }
            }),
            CartEffect::RemoveNft(id) => {
                Some(match self.cart.remove_nft(&id, &self.cancel).await {
                    Ok(_) => CartEvent::NftRemoved(id),
                    Err(error) => {
                        error!("{}", error);
                        CartEvent::RemoveFailed(error.kind())
                    }
                })
            }
            CartEffect::ClearCart => Some(match self.cart.remove_all(&self.cancel).await {
                Ok(_) => CartEvent::CartCleared,
                Err(error) => {
                    error!("{}", error);
                    CartEvent::RemoveFailed(error.kind())
                }
            }),
            CartEffect::PersistSort(sort) => {
                if let Err(error) = sort.store(&self.prefs) {
                    warn!(%error, "cannot persist sort key");
                }
                None
            }
            CartEffect::Render(cart) => {
                self.view.render_cart(&cart);
                None
            }
            CartEffect::ShowError(model) => {
                self.view.show_error(&model);
                None
            }
        }
    }
}
