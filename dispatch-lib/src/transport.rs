//! The seam between the pipeline and the network.
//!
//! A [`Transport`] executes a single request. The pipeline shares one
//! transport between all of its workers, so implementations must be
//! `Send + Sync`. Anything that can produce a [`Response`] can be plugged in,
//! which is how tests replace the network with canned responses.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Request, Response};

use crate::{ErrorKind, Result};

/// Executes requests on behalf of the pipeline workers
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Execute `request`, returning the response or the reason it failed.
    ///
    /// Any timeout is the transport's own business; the pipeline does not
    /// cancel requests.
    async fn execute(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(&self, request: Request) -> Result<Response> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(ErrorKind::NetworkRequest)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request) -> Result<Response> {
        (**self).execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientBuilder;
    use http::StatusCode;
    use reqwest::Method;
    use test_utils::mock_server;

    #[tokio::test]
    async fn test_reqwest_client_executes_request() {
        let mock_server = mock_server!(StatusCode::OK);
        let client = ClientBuilder::default().client().unwrap();
        let request = Request::new(Method::GET, mock_server.uri().parse().unwrap());

        let response = Transport::execute(&client, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reqwest_client_maps_network_errors() {
        let client = ClientBuilder::default().client().unwrap();
        // Nothing listens on port 1
        let request = Request::new(Method::GET, "http://127.0.0.1:1/".parse().unwrap());

        let err = Transport::execute(&client, request).await.unwrap_err();
        assert!(matches!(err, ErrorKind::NetworkRequest(_)));
    }
}
