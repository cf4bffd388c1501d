use reqwest::Method;
use url::form_urlencoded;

use crate::model::Profile;

pub const ORDER_PATH: &str = "/api/v1/orders/1";
pub const PROFILE_PATH: &str = "/api/v1/profile/1";

/// A call to the marketplace api: method, path relative to the base url
/// and an optional form-encoded body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub form: Option<String>,
}

impl Request {
    fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            form: None,
        }
    }

    fn put(path: impl Into<String>, form: String) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            form: Some(form),
        }
    }

    pub fn order() -> Self {
        Self::get(ORDER_PATH)
    }

    /// Replaces the whole content of the order, an empty slice empties it.
    pub fn change_order(nfts: &[String]) -> Self {
        Self::put(ORDER_PATH, form_list("nfts", nfts))
    }

    pub fn nft_by_id(id: &str) -> Self {
        Self::get(format!("/api/v1/nft/{}", id))
    }

    pub fn profile() -> Self {
        Self::get(PROFILE_PATH)
    }

    pub fn update_profile(profile: &Profile) -> Self {
        Self::put(PROFILE_PATH, profile_form(profile))
    }

    pub fn put_likes(likes: &[String]) -> Self {
        Self::put(PROFILE_PATH, form_list("likes", likes))
    }

    pub fn currencies() -> Self {
        Self::get("/api/v1/currencies")
    }

    pub fn pay(currency_id: &str) -> Self {
        Self::get(format!("{}/payment/{}", ORDER_PATH, currency_id))
    }

    pub fn users() -> Self {
        Self::get("/api/v1/users")
    }

    pub fn user(id: &str) -> Self {
        Self::get(format!("/api/v1/users/{}", id))
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// `key=a&key=b`, or a bare `key=` for an empty list.
fn form_list(key: &str, values: &[String]) -> String {
    if values.is_empty() {
        return format!("{}=", key);
    }

    values
        .iter()
        .map(|value| format!("{}={}", key, encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn joined(values: &[String]) -> String {
    values
        .iter()
        .map(|value| encode(value))
        .collect::<Vec<_>>()
        .join(",")
}

fn profile_form(profile: &Profile) -> String {
    let likes = if profile.likes.is_empty() {
        "null".to_owned()
    } else {
        joined(&profile.likes)
    };

    [
        ("name", encode(&profile.name)),
        ("avatar", encode(&profile.avatar)),
        ("description", encode(&profile.description)),
        ("website", encode(&profile.website)),
        ("nfts", joined(&profile.nfts)),
        ("likes", likes),
        ("id", encode(&profile.id)),
    ]
    .iter()
    .map(|(key, value)| format!("{}={}", key, value))
    .collect::<Vec<_>>()
    .join("&")
}
