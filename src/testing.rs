use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{error::Error, request::Request, state::NetworkClient};

#[derive(Clone)]
enum Reply {
    Json(Value, Option<Duration>),
    Status(u16),
}

/// In-memory stand-in for the marketplace api. Unknown routes answer 404.
#[derive(Clone, Default)]
pub struct MockApi {
    routes: Arc<Mutex<HashMap<(Method, String), Reply>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl MockApi {
    pub fn reply(&self, method: Method, path: &str, body: Value) {
        self.route(method, path, Reply::Json(body, None));
    }

    pub fn reply_after(&self, method: Method, path: &str, body: Value, delay: Duration) {
        self.route(method, path, Reply::Json(body, Some(delay)));
    }

    pub fn fail(&self, method: Method, path: &str, status: u16) {
        self.route(method, path, Reply::Status(status));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn route(&self, method: Method, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_owned()), reply);
    }
}

impl NetworkClient for MockApi {
    async fn send<T>(&self, request: Request) -> Result<T, Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let reply = {
            self.requests.lock().unwrap().push(request.clone());
            self.routes
                .lock()
                .unwrap()
                .get(&(request.method.clone(), request.path.clone()))
                .cloned()
        };

        match reply {
            Some(Reply::Json(body, delay)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(serde_json::from_value(body)?)
            }
            Some(Reply::Status(status)) => Err(Error::status(
                &request.path,
                StatusCode::from_u16(status).unwrap(),
            )),
            None => Err(Error::status(&request.path, StatusCode::NOT_FOUND)),
        }
    }
}
