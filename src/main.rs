mod cart;
mod cli;
mod client;
mod error;
mod filter;
mod model;
mod prefs;
mod presenter;
mod request;
mod service;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use std::{env, iter, process, time::Duration};

use anyhow::{anyhow, Context};
use clap::Parser;
use cli::{Cli, Command};
use tokio::{runtime as tokio_runtime, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    client::{cancellable, HttpClient},
    error::ErrorModel,
    filter::{CollectionSort, SortKey},
    model::{Nft, ProfileEdit},
    prefs::Preferences,
    presenter::{
        cart::{CartEvent, CartPhase, CartPresenter, CartScreen, CartView},
        drive,
        pay::{PayEvent, PayPhase, PayPresenter, PayScreen, PayView},
        profile::{ProfileEvent, ProfilePhase, ProfilePresenter, ProfileScreen, ProfileView},
        profile_nfts::{
            ProfileNftsEvent, ProfileNftsPhase, ProfileNftsPresenter, ProfileNftsScreen,
            ProfileNftsView,
        },
        user_nfts::{
            UserNftsEvent, UserNftsPhase, UserNftsPresenter, UserNftsScreen, UserNftsView,
        },
        Executor, Machine, Outcome, View,
    },
    state::Services,
};

fn main() {
    // parse arguments
    let cli = Cli::parse();

    setup_tracing();

    // main task of the client
    let Cli {
        base_url,
        token,
        timeout_ms,
        prefs,
        retries,
        command,
        ..
    } = cli;
    let run = async move {
        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupted, cancel pending requests");
                    cancel.cancel();
                }
            }
        });

        let client = HttpClient::try_new(&base_url, token, Duration::from_millis(timeout_ms))?;
        let prefs = match prefs {
            Some(path) => Preferences::load(path)?,
            None => Preferences::in_memory(),
        };
        // grab all services of the session into one place
        let services = Services::new(client);

        let script = Script { retries };
        run_command(command, services, prefs, script, cancel).await
    };

    // setup runtime
    let result = if cli.current_thread {
        debug!(name = "tokio", "build with 'current_thread' flavor");
        tokio_runtime::Builder::new_current_thread()
    } else if cli.multi_thread {
        debug!(name = "tokio", "build with 'multi_thread' flavor");
        let mut builder = tokio_runtime::Builder::new_multi_thread();
        if let Some(n) = cli.workers {
            debug!(name = "tokio", "build with {} workers", n);
            builder.worker_threads(n);
        }
        builder
    } else {
        panic!("neither 'current thread' nor 'multi thread' flavor was selected");
    }
    .enable_all()
    .build()
    .expect("failed to build tokio runtime")
    .block_on(run);

    if let Err(error) = result {
        error!("{:#}", error);
        process::exit(1);
    }
}

/// Builds the events a command feeds to its screen.
#[derive(Clone, Copy)]
struct Script {
    /// Retries after a failed load or a rejected payment.
    retries: usize,
}

impl Script {
    /// Opens the screen, retrying the load if it fails.
    fn open<E>(self, loaded: E, retry: fn() -> E) -> Vec<E> {
        iter::once(loaded)
            .chain(iter::repeat_with(retry).take(self.retries))
            .collect()
    }

    fn pay(self, currency_id: String) -> Vec<PayEvent> {
        let mut events = self.open(PayEvent::ViewLoaded, || PayEvent::Retry);
        events.push(PayEvent::CurrencySelected(currency_id));
        events.push(PayEvent::PayPressed);
        events.extend(iter::repeat_with(|| PayEvent::RetryPay).take(self.retries));
        // back to choosing if every attempt failed
        events.push(PayEvent::CancelPay);
        events
    }
}

async fn run_command(
    command: Command,
    services: Services<HttpClient>,
    prefs: Preferences,
    script: Script,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let cart = || script.open(CartEvent::ViewLoaded, || CartEvent::Retry);

    match command {
        Command::Cart { sort } => {
            let mut events = cart();
            events.extend(sort.map(CartEvent::SortSelected));
            run_cart(&services, prefs, events, cancel).await
        }
        Command::Remove { id } => {
            let mut events = cart();
            events.push(CartEvent::RemoveRequested(id));
            run_cart(&services, prefs, events, cancel).await
        }
        Command::Clear => {
            let mut events = cart();
            events.push(CartEvent::ClearRequested);
            run_cart(&services, prefs, events, cancel).await?;
            if !services.cart.nfts().is_empty() {
                return Err(anyhow!("cart was not cleared"));
            }
            info!("cart cleared");
            Ok(())
        }
        Command::Nft { id } => {
            let nft = cancellable(&cancel, services.nft_by_id.load_nft(&id)).await?;
            println!("{}", nft_line(&nft));
            Ok(())
        }
        Command::Currencies => {
            let currencies = cancellable(&cancel, services.pay.currencies()).await?;
            for currency in currencies {
                println!("{:>4}  {:<6} {}", currency.id, currency.name, currency.title);
            }
            Ok(())
        }
        Command::Pay { currency_id } => {
            let screen = PayScreen {
                pay: services.pay.clone(),
                cart: services.cart.clone(),
                view: TerminalView,
                cancel: cancel.clone(),
            };
            let events = script.pay(currency_id);
            let presenter = run_screen(PayPresenter::default(), &screen, events, &cancel).await?;
            match presenter.phase {
                PayPhase::Paid => Ok(()),
                phase => Err(anyhow!("payment did not go through ({:?})", phase)),
            }
        }
        Command::Profile => {
            let events = script.open(ProfileEvent::ViewLoaded, || ProfileEvent::Retry);
            run_profile(&services, ProfilePresenter::default(), events, cancel).await
        }
        Command::MyNfts { sort } => {
            let profile = cancellable(&cancel, services.profile.load_profile()).await?;
            let events = script.open(ProfileNftsEvent::ViewLoaded, || ProfileNftsEvent::Retry);
            run_profile_nfts(&services, profile.nfts, sort, events, cancel).await
        }
        Command::Favourites { sort } => {
            let profile = cancellable(&cancel, services.profile.load_profile()).await?;
            let events = script.open(ProfileNftsEvent::ViewLoaded, || ProfileNftsEvent::Retry);
            run_profile_nfts(&services, profile.likes, sort, events, cancel).await
        }
        Command::EditProfile {
            name,
            description,
            website,
            avatar,
        } => {
            let profile = cancellable(&cancel, services.profile.load_profile()).await?;
            let current = ProfileEdit::from(&profile);
            let edit = ProfileEdit {
                name: name.unwrap_or(current.name),
                description: description.unwrap_or(current.description),
                website: website.unwrap_or(current.website),
                avatar: avatar.unwrap_or(current.avatar),
            };
            let presenter = ProfilePresenter {
                phase: ProfilePhase::Ready,
                profile: Some(profile),
            };
            let events = vec![ProfileEvent::EditSubmitted(edit)];
            run_profile(&services, presenter, events, cancel).await
        }
        Command::Unlike { ids } => {
            let profile = cancellable(&cancel, services.profile.load_profile()).await?;
            let presenter = ProfilePresenter {
                phase: ProfilePhase::Ready,
                profile: Some(profile),
            };
            run_profile(&services, presenter, vec![ProfileEvent::Unliked(ids)], cancel).await
        }
        Command::Users => {
            let users = cancellable(&cancel, services.users.load_users()).await?;
            for user in users {
                println!(
                    "{:>4}  {:<24} rating {:<4} nfts {}",
                    user.id,
                    user.name,
                    user.rating,
                    user.nfts.len()
                );
            }
            Ok(())
        }
        Command::UserNfts {
            user_id,
            like,
            basket,
        } => {
            let user = cancellable(&cancel, services.users.load_user(&user_id)).await?;
            let screen = UserNftsScreen {
                nfts: services.user_nfts.clone(),
                likes: services.likes.clone(),
                orders: services.orders.clone(),
                view: TerminalView,
                cancel: cancel.clone(),
            };

            let mut events = script.open(UserNftsEvent::ViewLoaded, || UserNftsEvent::Retry);
            events.extend(like.map(UserNftsEvent::LikeToggled));
            events.extend(basket.map(UserNftsEvent::BasketToggled));

            let presenter =
                run_screen(UserNftsPresenter::new(user.nfts), &screen, events, &cancel).await?;
            match presenter.phase {
                UserNftsPhase::Failed(kind) => Err(anyhow!(
                    "nfts of user '{}' are unavailable ({:?})",
                    user_id,
                    kind
                )),
                _ => Ok(()),
            }
        }
    }
}

async fn run_cart(
    services: &Services<HttpClient>,
    prefs: Preferences,
    events: Vec<CartEvent>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let presenter = CartPresenter::new(SortKey::load(&prefs));
    let screen = CartScreen {
        cart: services.cart.clone(),
        prefs,
        view: TerminalView,
        cancel: cancel.clone(),
    };

    let presenter = run_screen(presenter, &screen, events, &cancel).await?;
    match presenter.phase {
        CartPhase::Failed(kind) => Err(anyhow!("cart is unavailable ({:?})", kind)),
        _ => Ok(()),
    }
}

async fn run_profile(
    services: &Services<HttpClient>,
    presenter: ProfilePresenter,
    events: Vec<ProfileEvent>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let screen = ProfileScreen {
        profile: services.profile.clone(),
        view: TerminalView,
        cancel: cancel.clone(),
    };

    let presenter = run_screen(presenter, &screen, events, &cancel).await?;
    match presenter.phase {
        ProfilePhase::Failed(kind) => Err(anyhow!("profile is unavailable ({:?})", kind)),
        _ => Ok(()),
    }
}

async fn run_profile_nfts(
    services: &Services<HttpClient>,
    ids: Vec<String>,
    sort: Option<CollectionSort>,
    events: Vec<ProfileNftsEvent>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let screen = ProfileNftsScreen {
        nfts: services.nft_by_id.clone(),
        view: TerminalView,
        cancel: cancel.clone(),
    };

    let presenter =
        run_screen(ProfileNftsPresenter::new(ids, sort), &screen, events, &cancel).await?;
    match presenter.phase {
        ProfileNftsPhase::Failed(kind) => Err(anyhow!("nfts are unavailable ({:?})", kind)),
        _ => Ok(()),
    }
}

/// Feeds the scripted events of one command to a screen and waits for it
/// to settle.
async fn run_screen<M, X>(
    presenter: M,
    screen: &X,
    events: Vec<M::Event>,
    cancel: &CancellationToken,
) -> anyhow::Result<M>
where
    M: Machine,
    X: Executor<M>,
{
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for event in events {
        tx.send(event)
            .await
            .map_err(|_| anyhow!("screen input closed"))?;
    }
    drop(tx);

    let outcome = drive(presenter, screen, rx, cancel).await;
    if matches!(outcome, Outcome::Cancelled(_)) {
        return Err(error::Error::Cancelled).context("screen was interrupted");
    }

    Ok(outcome.into_inner())
}

/// Prints screens to stdout.
struct TerminalView;

impl View for TerminalView {
    fn render_cart(&self, cart: &CartView) {
        if let Some(text) = cart_text(cart) {
            println!("{}", text);
        }
    }

    fn render_pay(&self, pay: &PayView) {
        if let Some(id) = &pay.selected {
            debug!(currency = id, "currency selected");
        }
    }

    fn render_profile(&self, profile: &ProfileView) {
        if !profile.loading {
            println!("{}", profile_text(profile));
        }
    }

    fn render_profile_nfts(&self, nfts: &ProfileNftsView) {
        if nfts.loading {
            return;
        }
        if nfts.empty {
            println!("No nfts yet");
        }
        for nft in &nfts.items {
            println!("{}", nft_line(nft));
        }
    }

    fn render_user_nfts(&self, nfts: &UserNftsView) {
        if nfts.loading {
            return;
        }
        for cell in &nfts.cells {
            println!(
                "{:>4}  {:<24} {:>8.2} ETH  {}  {}{}",
                cell.id,
                cell.name,
                cell.price,
                stars(cell.rating),
                if cell.liked { "♥" } else { " " },
                if cell.in_basket { " in cart" } else { "" },
            );
        }
    }

    fn show_pay_result(&self, success: bool) {
        if success {
            println!("Payment succeeded, the cart is cleared");
        } else {
            println!("Payment failed");
        }
    }

    fn show_error(&self, error: &ErrorModel) {
        match error.action {
            Some(action) => eprintln!("{} ({} available)", error.message, action),
            None => eprintln!("{}", error.message),
        }
    }
}

fn stars(rating: u8) -> String {
    (0..5).map(|n| if n < rating { '★' } else { '☆' }).collect()
}

fn nft_line(nft: &Nft) -> String {
    let line = format!(
        "{:>4}  {:<24} {:>8.2} ETH  {}",
        nft.id,
        nft.name,
        nft.price,
        stars(nft.rating.get())
    );
    match nft.created() {
        Some(created) => format!("{}  {}", line, created.format("%d.%m.%Y")),
        None => line,
    }
}

fn cart_text(cart: &CartView) -> Option<String> {
    if cart.loading {
        return None;
    }
    if cart.empty {
        return Some("The cart is empty".to_owned());
    }

    let mut lines: Vec<String> = cart.items.iter().map(nft_line).collect();
    lines.push(format!("{} nft, {:.2} ETH", cart.count, cart.total_price));
    Some(lines.join("\n"))
}

fn profile_text(profile: &ProfileView) -> String {
    format!(
        "{}\n{}\n{}\nMy NFT ({})\nFavourite NFT ({})",
        profile.name, profile.description, profile.website, profile.my_nfts, profile.favourites
    )
}

fn setup_tracing() {
    // use "info" level dy default
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    // Turn on error backtrace by default.
    // FYI:
    // - if you want panics and errors to both have backtraces, set RUST_BACKTRACE=1,
    // - If you want only errors to have backtraces, set RUST_LIB_BACKTRACE=1,
    // - if you want only panics to have backtraces, set RUST_BACKTRACE=1 and RUST_LIB_BACKTRACE=0.
    if env::var("RUST_LIB_BACKTRACE").is_err() {
        env::set_var("RUST_LIB_BACKTRACE", "1");
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        // log to stderr, stdout is for the screens
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::{model::fixtures, testing::MockApi};

    #[test]
    fn cart_text_lists_items_and_total() {
        let cart = CartView {
            items: vec![fixtures::nft("1", "April", 1.5, 3)],
            count: 1,
            total_price: 1.5,
            loading: false,
            empty: false,
        };

        let text = cart_text(&cart).unwrap();

        assert!(text.contains("April"));
        assert!(text.contains("★★★☆☆"));
        assert!(text.contains("20.04.2023"));
        assert!(text.ends_with("1 nft, 1.50 ETH"));
    }

    #[test]
    fn empty_and_loading_cart() {
        let mut cart = CartView {
            items: vec![],
            count: 0,
            total_price: 0.0,
            loading: true,
            empty: false,
        };
        assert_eq!(cart_text(&cart), None);

        cart.loading = false;
        cart.empty = true;
        assert_eq!(cart_text(&cart).as_deref(), Some("The cart is empty"));
    }

    #[test]
    fn script_retries_loads_and_payment() {
        let script = Script { retries: 2 };

        let events = script.open(CartEvent::ViewLoaded, || CartEvent::Retry);
        assert!(matches!(
            events[..],
            [CartEvent::ViewLoaded, CartEvent::Retry, CartEvent::Retry]
        ));

        let events = Script { retries: 1 }.pay("2".to_owned());
        assert!(matches!(
            &events[..],
            [
                PayEvent::ViewLoaded,
                PayEvent::Retry,
                PayEvent::CurrencySelected(id),
                PayEvent::PayPressed,
                PayEvent::RetryPay,
                PayEvent::CancelPay,
            ] if id == "2"
        ));
    }

    #[tokio::test]
    async fn scripted_retry_recovers_payment() {
        let api = MockApi::default();
        api.reply(
            Method::GET,
            "/api/v1/currencies",
            json!([{ "id": "2", "title": "Bitcoin", "name": "BTC", "image": "https://btc.test" }]),
        );
        api.reply(
            Method::GET,
            "/api/v1/orders/1/payment/2",
            json!({ "success": false, "orderId": "1", "id": "2" }),
        );
        let services = Services::new(api.clone());
        let cancel = CancellationToken::new();
        let screen = PayScreen {
            pay: services.pay.clone(),
            cart: services.cart.clone(),
            view: TerminalView,
            cancel: cancel.clone(),
        };

        let presenter = run_screen(
            PayPresenter::default(),
            &screen,
            Script { retries: 1 }.pay("2".to_owned()),
            &cancel,
        )
        .await
        .unwrap();

        // rejected twice, then cancelled back to the currency list
        assert_eq!(presenter.phase, PayPhase::Choosing);
        let payments = api
            .requests()
            .into_iter()
            .filter(|request| request.path == "/api/v1/orders/1/payment/2")
            .count();
        assert_eq!(payments, 2);
    }

    #[tokio::test]
    async fn scripted_screen_settles() {
        let api = MockApi::default();
        api.reply(Method::GET, "/api/v1/orders/1", json!({ "id": "1", "nfts": [] }));
        let services = Services::new(api);
        let cancel = CancellationToken::new();
        let screen = CartScreen {
            cart: services.cart.clone(),
            prefs: Preferences::in_memory(),
            view: TerminalView,
            cancel: cancel.clone(),
        };

        let presenter = run_screen(
            CartPresenter::new(SortKey::Id),
            &screen,
            vec![CartEvent::ViewLoaded],
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(presenter.phase, CartPhase::Ready);
        assert!(presenter.view().empty);
    }

    #[tokio::test]
    async fn cancelled_screen_is_an_error() {
        let services = Services::new(MockApi::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let screen = CartScreen {
            cart: services.cart.clone(),
            prefs: Preferences::in_memory(),
            view: TerminalView,
            cancel: cancel.clone(),
        };

        let result = run_screen(
            CartPresenter::new(SortKey::Id),
            &screen,
            vec![CartEvent::ViewLoaded],
            &cancel,
        )
        .await;

        assert!(result.is_err());
    }
}
