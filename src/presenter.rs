//! Screens as state machines.
//!
//! A presenter never performs side effects itself: `transition` returns the
//! next state and a list of effects, and [`drive`] executes them through an
//! [`Executor`], feeding the resulting events back in.

pub mod cart;
pub mod pay;
pub mod profile;
pub mod profile_nfts;
pub mod user_nfts;

use std::{collections::VecDeque, future::Future};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::ErrorModel;

pub trait Machine: Sized {
    type Event: std::fmt::Debug + Send;
    type Effect: std::fmt::Debug + Send;

    fn transition(self, event: Self::Event) -> (Self, Vec<Self::Effect>);
}

pub trait Executor<M: Machine> {
    /// Runs one effect, an event is returned when the presenter must learn
    /// about its result.
    fn execute(&self, effect: M::Effect) -> impl Future<Output = Option<M::Event>> + Send;
}

/// Where rendered screens end up.
pub trait View: Send + Sync {
    fn render_cart(&self, _cart: &cart::CartView) {}

    fn render_pay(&self, _pay: &pay::PayView) {}

    fn render_profile(&self, _profile: &profile::ProfileView) {}

    fn render_profile_nfts(&self, _nfts: &profile_nfts::ProfileNftsView) {}

    fn render_user_nfts(&self, _nfts: &user_nfts::UserNftsView) {}

    fn show_pay_result(&self, _success: bool) {}

    fn show_error(&self, error: &ErrorModel);
}

#[derive(Debug)]
pub enum Outcome<M> {
    /// Inputs are closed and nothing is left to do.
    Finished(M),
    Cancelled(M),
}

impl<M> Outcome<M> {
    pub fn into_inner(self) -> M {
        match self {
            Outcome::Finished(machine) | Outcome::Cancelled(machine) => machine,
        }
    }
}

/// Feeds `inputs` to the machine, executing effects until the inputs are
/// closed and no event is pending, or until `cancel` fires.
pub async fn drive<M, X>(
    mut machine: M,
    executor: &X,
    mut inputs: mpsc::Receiver<M::Event>,
    cancel: &CancellationToken,
) -> Outcome<M>
where
    M: Machine,
    X: Executor<M>,
{
    let mut pending = VecDeque::new();

    loop {
        let event = match pending.pop_front() {
            Some(event) => event,
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Outcome::Cancelled(machine),
                input = inputs.recv() => match input {
                    Some(event) => event,
                    None => return Outcome::Finished(machine),
                },
            },
        };

        trace!(?event, "presenter event");
        let (next, effects) = machine.transition(event);
        machine = next;

        for effect in effects {
            trace!(?effect, "presenter effect");
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Outcome::Cancelled(machine),
                result = executor.execute(effect) => result,
            };
            pending.extend(result);
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // counts to a target, asking the executor to "tick" each time
    #[derive(Debug, PartialEq)]
    struct Counter {
        value: u32,
        target: u32,
    }

    #[derive(Debug)]
    enum Event {
        Start(u32),
        Ticked,
    }

    #[derive(Debug)]
    enum Effect {
        Tick,
    }

    impl Machine for Counter {
        type Event = Event;
        type Effect = Effect;

        fn transition(self, event: Event) -> (Self, Vec<Effect>) {
            match event {
                Event::Start(target) => (Counter { value: 0, target }, vec![Effect::Tick]),
                Event::Ticked if self.value + 1 < self.target => (
                    Counter {
                        value: self.value + 1,
                        ..self
                    },
                    vec![Effect::Tick],
                ),
                Event::Ticked => (
                    Counter {
                        value: self.value + 1,
                        ..self
                    },
                    vec![],
                ),
            }
        }
    }

    #[derive(Default)]
    struct Ticker {
        ticks: Mutex<u32>,
    }

    impl Executor<Counter> for Ticker {
        async fn execute(&self, _: Effect) -> Option<Event> {
            *self.ticks.lock().unwrap() += 1;
            Some(Event::Ticked)
        }
    }

    struct Stalled;

    impl Executor<Counter> for Stalled {
        async fn execute(&self, _: Effect) -> Option<Event> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn drive_until_inputs_closed() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(Event::Start(3)).await.unwrap();
        drop(tx);

        let ticker = Ticker::default();
        let outcome = drive(
            Counter { value: 0, target: 0 },
            &ticker,
            rx,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(outcome, Outcome::Finished(Counter { value: 3, target: 3 })));
        assert_eq!(*ticker.ticks.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn cancel_stalled_effect() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(Event::Start(3)).await.unwrap();

        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                cancel.cancel();
            })
        };

        let outcome = drive(Counter { value: 0, target: 0 }, &Stalled, rx, &cancel).await;
        canceller.await.unwrap();

        assert!(matches!(outcome, Outcome::Cancelled(Counter { value: 0, target: 3 })));
        // keeps the sender alive until the end
        drop(tx);
    }
}
