pub use self::rating::Rating;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// reserve a type for operations with money
pub type Price = f64;

// keep it in separate mod to get benefits from incapsulation
mod rating {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(try_from = "u8")]
    pub struct Rating(u8);

    impl Rating {
        pub fn get(self) -> u8 {
            self.0
        }
    }

    impl TryFrom<u8> for Rating {
        type Error = String;

        fn try_from(value: u8) -> Result<Self, Self::Error> {
            if value <= 5 {
                Ok(Self(value))
            } else {
                Err(format!(
                    "Value must be within 0..=5 range, but got '{}'",
                    value
                ))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    pub id: String,
    pub name: String,
    pub images: Vec<String>,
    pub rating: Rating,
    pub description: String,
    pub price: Price,
    pub author: String,
    pub created_at: String,
}

impl Nft {
    /// `createdAt` as a timestamp, if the api sent a valid RFC 3339 string.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|date| date.with_timezone(&Utc))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub nfts: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub description: String,
    pub website: String,
    pub nfts: Vec<String>,
    pub likes: Vec<String>,
}

impl Profile {
    pub fn differs_from(&self, edit: &ProfileEdit) -> bool {
        self.name != edit.name
            || self.description != edit.description
            || self.avatar != edit.avatar
            || self.website != edit.website
    }

    pub fn with_edit(&self, edit: &ProfileEdit) -> Profile {
        Profile {
            name: edit.name.clone(),
            avatar: edit.avatar.clone(),
            description: edit.description.clone(),
            website: edit.website.clone(),
            ..self.clone()
        }
    }
}

/// Fields of the profile the user may edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileEdit {
    pub name: String,
    pub description: String,
    pub website: String,
    pub avatar: String,
}

impl From<&Profile> for ProfileEdit {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            description: profile.description.clone(),
            website: profile.website.clone(),
            avatar: profile.avatar.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Likes {
    pub likes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    pub title: String,
    pub name: String,
    pub image: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub success: bool,
    pub order_id: String,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar: String,
    #[serde(default)]
    pub description: Option<String>,
    pub website: String,
    pub nfts: Vec<String>,
    pub rating: String,
}

/// Part of an nft shown on another user's collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserNft {
    pub id: String,
    pub name: String,
    pub images: Vec<String>,
    pub price: Price,
    pub rating: Rating,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn nft(id: &str, name: &str, price: Price, rating: u8) -> Nft {
        Nft {
            id: id.to_owned(),
            name: name.to_owned(),
            images: vec![format!("https://images.test/{}.png", id)],
            rating: Rating::try_from(rating).unwrap(),
            description: String::new(),
            price,
            author: "author".to_owned(),
            created_at: "2023-04-20T02:22:27Z".to_owned(),
        }
    }

    pub fn profile() -> Profile {
        Profile {
            id: "1".to_owned(),
            name: "Joaquin Phoenix".to_owned(),
            avatar: "https://avatars.test/1.png".to_owned(),
            description: "Actor".to_owned(),
            website: "https://joaquin.test".to_owned(),
            nfts: vec!["a".to_owned(), "b".to_owned()],
            likes: vec!["a".to_owned(), "c".to_owned(), "d".to_owned()],
        }
    }
}
