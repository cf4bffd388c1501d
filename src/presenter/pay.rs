use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    cart::CartOrderService,
    client::cancellable,
    error::{ErrorKind, ErrorModel},
    model::Currency,
    service::PayService,
    state::NetworkClient,
};

use super::{Executor, Machine, View};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayPhase {
    Initial,
    Loading,
    Choosing,
    Paying,
    Paid,
    /// Payment did not go through, retry or cancel is expected.
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PayPresenter {
    pub phase: PayPhase,
    pub currencies: Vec<Currency>,
    pub selected: Option<String>,
}

#[derive(Debug)]
pub enum PayEvent {
    ViewLoaded,
    Retry,
    CurrenciesLoaded(Vec<Currency>),
    LoadFailed(ErrorKind),
    CurrencySelected(String),
    PayPressed,
    PayResult(bool),
    PayFailed(ErrorKind),
    RetryPay,
    CancelPay,
    CartCleared,
    ClearFailed(ErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum PayEffect {
    LoadCurrencies,
    Pay(String),
    ClearCart,
    Render(PayView),
    ShowPayResult(bool),
    ShowError(ErrorModel),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PayView {
    pub currencies: Vec<Currency>,
    pub selected: Option<String>,
    pub pay_enabled: bool,
    pub loading: bool,
    pub retry_offered: bool,
}

impl Default for PayPresenter {
    fn default() -> Self {
        Self {
            phase: PayPhase::Initial,
            currencies: Vec::new(),
            selected: None,
        }
    }
}

impl PayPresenter {
    pub fn view(&self) -> PayView {
        PayView {
            currencies: self.currencies.clone(),
            selected: self.selected.clone(),
            pay_enabled: self.phase == PayPhase::Choosing && self.selected.is_some(),
            loading: matches!(self.phase, PayPhase::Loading | PayPhase::Paying),
            retry_offered: self.phase == PayPhase::Failed,
        }
    }

    fn with_phase(self, phase: PayPhase) -> Self {
        Self { phase, ..self }
    }

    fn render(self, mut effects: Vec<PayEffect>) -> (Self, Vec<PayEffect>) {
        effects.insert(0, PayEffect::Render(self.view()));
        (self, effects)
    }

    fn pay(self) -> (Self, Vec<PayEffect>) {
        match self.selected.clone() {
            Some(currency_id) => self
                .with_phase(PayPhase::Paying)
                .render(vec![PayEffect::Pay(currency_id)]),
            None => (self, vec![]),
        }
    }
}

impl Machine for PayPresenter {
    type Event = PayEvent;
    type Effect = PayEffect;

    fn transition(self, event: PayEvent) -> (Self, Vec<PayEffect>) {
        use PayEvent::*;
        use PayPhase::*;

        match (self.phase, event) {
            (Initial, ViewLoaded | Retry) => self
                .with_phase(Loading)
                .render(vec![PayEffect::LoadCurrencies]),
            (Loading, CurrenciesLoaded(currencies)) => Self {
                currencies,
                ..self
            }
            .with_phase(Choosing)
            .render(vec![]),
            (Loading, LoadFailed(kind)) => self
                .with_phase(Initial)
                .render(vec![PayEffect::ShowError(ErrorModel::retryable(kind))]),
            (Choosing, CurrencySelected(id)) => {
                if !self.currencies.iter().any(|currency| currency.id == id) {
                    return (self, vec![]);
                }
                Self {
                    selected: Some(id),
                    ..self
                }
                .render(vec![])
            }
            (Choosing, PayPressed) | (Failed, RetryPay) => self.pay(),
            (Failed, CancelPay) => self.with_phase(Choosing).render(vec![]),
            (Paying, PayResult(true)) => self
                .with_phase(Paid)
                .render(vec![PayEffect::ShowPayResult(true), PayEffect::ClearCart]),
            (Paying, PayResult(false)) => self
                .with_phase(Failed)
                .render(vec![PayEffect::ShowPayResult(false)]),
            (Paying, PayFailed(kind)) => self
                .with_phase(Failed)
                .render(vec![PayEffect::ShowError(ErrorModel::retryable(kind))]),
            (Paid, CartCleared) => self.render(vec![]),
            (Paid, ClearFailed(kind)) => {
                (self, vec![PayEffect::ShowError(ErrorModel::notice(kind))])
            }
            (_, event) => {
                debug!(presenter = "pay", phase = ?self.phase, ?event, "event ignored");
                (self, vec![])
            }
        }
    }
}

pub struct PayScreen<N, V> {
    pub pay: PayService<N>,
    pub cart: CartOrderService<N>,
    pub view: V,
    pub cancel: CancellationToken,
}

impl<N, V> Executor<PayPresenter> for PayScreen<N, V>
where
    N: NetworkClient + Clone + Send + Sync + 'static,
    V: View,
{
    async fn execute(&self, effect: PayEffect) -> Option<PayEvent> {
        match effect {
            PayEffect::LoadCurrencies => Some(
                match cancellable(&self.cancel, self.pay.currencies()).await {
                    Ok(currencies) => PayEvent::CurrenciesLoaded(currencies),
                    Err(error) => {
                        error!("{}", error);
                        PayEvent::LoadFailed(error.kind())
                    }
                },
            ),
            PayEffect::Pay(currency_id) => Some(
                match cancellable(&self.cancel, self.pay.pay_order(&currency_id)).await {
                    Ok(payment) => PayEvent::PayResult(payment.success),
                    Err(error) => {
                        error!("{}", error);
                        PayEvent::PayFailed(error.kind())
                    }
                },
            ),
            PayEffect::ClearCart => Some(match self.cart.remove_all(&self.cancel).await {
                Ok(_) => PayEvent::CartCleared,
                Err(error) => {
                    error!("{}", error);
                    PayEvent::ClearFailed(error.kind())
                }
            }),
            PayEffect::Render(pay) => {
                self.view.render_pay(&pay);
                None
            }
            PayEffect::ShowPayResult(success) => {
                self.view.show_pay_result(success);
                None
            }
            PayEffect::ShowError(model) => {
                self.view.show_error(&model);
                None
            }
        }
    }
}
