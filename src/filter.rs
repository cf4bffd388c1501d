use std::cmp::Ordering;

use serde_repr::{Deserialize_repr, Serialize_repr};
use tracing::trace;

use crate::{error::Error, model::Nft, prefs::Preferences};

const FILTER_KEY: &str = "filter";

pub type Comparator = fn(&Nft, &Nft) -> Ordering;

/// How the cart is sorted. Codes are what gets persisted.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize_repr,
    Deserialize_repr,
    clap::ValueEnum,
)]
#[repr(u8)]
pub enum SortKey {
    #[default]
    Id = 0,
    Price = 1,
    Rating = 2,
    Title = 3,
}

impl SortKey {
    pub fn comparator(self) -> Comparator {
        match self {
            SortKey::Id => by_id as Comparator,
            SortKey::Price => by_price,
            SortKey::Rating => by_rating,
            SortKey::Title => by_title,
        }
    }

    /// Stable: nfts equal by the key keep their relative order.
    pub fn sort(self, nfts: &mut [Nft]) {
        nfts.sort_by(self.comparator());
    }

    /// The persisted key, `Id` when nothing valid is stored.
    pub fn load(prefs: &Preferences) -> SortKey {
        prefs
            .get(FILTER_KEY)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    pub fn store(self, prefs: &Preferences) -> Result<(), Error> {
        trace!(sort = ?self, "store sort key");
        prefs.set(FILTER_KEY, serde_json::to_value(self)?)
    }
}

/// How the "My NFT" and "Favourite NFT" collections are sorted. Only kept
/// for the screen, nothing is persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum CollectionSort {
    Price,
    Rating,
    Name,
}

impl CollectionSort {
    pub fn comparator(self) -> Comparator {
        match self {
            CollectionSort::Price => by_price as Comparator,
            CollectionSort::Rating => by_rating,
            CollectionSort::Name => by_name_ignoring_case,
        }
    }

    pub fn sort(self, nfts: &mut [Nft]) {
        nfts.sort_by(self.comparator());
    }
}

fn by_id(first: &Nft, second: &Nft) -> Ordering {
    first.id.cmp(&second.id)
}

fn by_price(first: &Nft, second: &Nft) -> Ordering {
    first.price.total_cmp(&second.price)
}

// higher rating first
fn by_rating(first: &Nft, second: &Nft) -> Ordering {
    second.rating.cmp(&first.rating)
}

fn by_title(first: &Nft, second: &Nft) -> Ordering {
    first.name.cmp(&second.name)
}

fn by_name_ignoring_case(first: &Nft, second: &Nft) -> Ordering {
    first.name.to_lowercase().cmp(&second.name.to_lowercase())
}
