use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;

use crate::filter::{CollectionSort, SortKey};

#[derive(clap::Parser)]
#[clap(name = "fake-nft", about = "FakeNFT marketplace client")]
pub struct Cli {
    /// Base url of the marketplace api
    #[clap(
        long,
        value_parser = NonEmptyStringValueParser::new(),
        env = "FAKE_NFT_BASE_URL",
    )]
    pub base_url: String,

    /// Api token, sent with every request (optional)
    #[clap(
        long,
        value_parser = NonEmptyStringValueParser::new(),
        env = "FAKE_NFT_TOKEN",
    )]
    pub token: Option<String>,

    /// Request timeout in milliseconds
    #[clap(
        long,
        value_parser = clap::value_parser!(u64).range(1..),
        default_value_t = 10_000,
        env = "FAKE_NFT_TIMEOUT_MS"
    )]
    pub timeout_ms: u64,

    /// File the preferences are kept in.
    /// They only live in memory if this option isn't used.
    #[clap(long, env = "FAKE_NFT_PREFS")]
    pub prefs: Option<PathBuf>,

    /// How many times a screen retries a failed load, or a rejected payment
    #[clap(long, default_value_t = 0, env = "FAKE_NFT_RETRIES")]
    pub retries: usize,

    /// Current thread scheduler
    #[clap(long, default_value_t = false, group = "runtime")]
    pub current_thread: bool,

    /// Multi thread scheduler
    #[clap(long, default_value_t = true, group = "runtime")]
    pub multi_thread: bool,

    /// Sets the number of worker threads
    #[clap(long, conflicts_with = "current_thread")]
    pub workers: Option<usize>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Show the cart
    Cart {
        /// Sort the cart and remember the choice
        #[clap(long, value_enum)]
        sort: Option<SortKey>,
    },

    /// Remove one nft from the cart
    Remove { id: String },

    /// Empty the cart
    Clear,

    /// Show one nft
    Nft { id: String },

    /// List currencies available for payment
    Currencies,

    /// Pay the cart with the given currency
    Pay { currency_id: String },

    /// Show the profile
    Profile,

    /// Change the profile, fields not given stay as they are
    EditProfile {
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long)]
        website: Option<String>,
        #[clap(long)]
        avatar: Option<String>,
    },

    /// Show the nfts of the profile
    MyNfts {
        #[clap(long, value_enum)]
        sort: Option<CollectionSort>,
    },

    /// Show the liked nfts of the profile
    Favourites {
        #[clap(long, value_enum)]
        sort: Option<CollectionSort>,
    },

    /// Remove nfts from favourites
    Unlike {
        #[clap(required = true)]
        ids: Vec<String>,
    },

    /// List users
    Users,

    /// Show nfts of a user, optionally toggling a like or the basket
    UserNfts {
        user_id: String,
        #[clap(long)]
        like: Option<String>,
        #[clap(long)]
        basket: Option<String>,
    },
}
