//! HTTP client for the storefront cart API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use duka_cart::{
    identity::Identity,
    remote::{
        NewRemoteItem, RemoteCart, RemoteCartClient, RemoteCartError, RemoteItemId,
        RemoteItemUpdate,
    },
};
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;

/// Connection settings for [`HttpCartClient`].
#[derive(Debug, Clone)]
pub struct HttpCartClientConfig {
    /// API root, e.g. `"https://shop.example.com/api"`.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

/// [`RemoteCartClient`] speaking JSON over HTTP with bearer auth.
#[derive(Clone)]
pub struct HttpCartClient {
    http: Client,
    base_url: String,
    identity: Arc<dyn Identity>,
}

impl std::fmt::Debug for HttpCartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpCartClient {
    /// Build a client that authenticates as whoever `identity` holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        config: HttpCartClientConfig,
        identity: Arc<dyn Identity>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            identity,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteCartError> {
        let token = self
            .identity
            .access_token()
            .ok_or(RemoteCartError::Unauthenticated)?;

        debug!(%method, path, "remote cart request");

        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }

    async fn send(request: RequestBuilder) -> Result<Response, RemoteCartError> {
        let response = request.send().await.map_err(http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(RemoteCartError::status(status.as_u16(), text));
        }

        Ok(response)
    }
}

#[async_trait]
impl RemoteCartClient for HttpCartClient {
    async fn fetch_cart(&self) -> Result<RemoteCart, RemoteCartError> {
        let response = Self::send(self.request(Method::GET, "/cart")?).await?;
        let body = response.text().await.map_err(http_error)?;

        parse_cart(&body)
    }

    async fn add_item(&self, item: NewRemoteItem) -> Result<(), RemoteCartError> {
        Self::send(self.request(Method::POST, "/cart/add")?.json(&item)).await?;

        Ok(())
    }

    async fn update_item(
        &self,
        item: RemoteItemId,
        update: RemoteItemUpdate,
    ) -> Result<(), RemoteCartError> {
        let path = format!("/cart/item/{item}");

        Self::send(self.request(Method::PUT, &path)?.json(&update)).await?;

        Ok(())
    }

    async fn remove_item(&self, item: RemoteItemId) -> Result<(), RemoteCartError> {
        let path = format!("/cart/item/{item}");

        Self::send(self.request(Method::DELETE, &path)?).await?;

        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), RemoteCartError> {
        Self::send(self.request(Method::DELETE, "/cart/clear")?).await?;

        Ok(())
    }

    async fn merge_guest_cart(&self) -> Result<RemoteCart, RemoteCartError> {
        let response = Self::send(self.request(Method::POST, "/cart/merge")?).await?;
        let body = response.text().await.map_err(http_error)?;

        parse_cart(&body)
    }
}

/// An empty body or a bare `null` is an empty cart.
fn parse_cart(body: &str) -> Result<RemoteCart, RemoteCartError> {
    let body = body.trim();

    if body.is_empty() || body == "null" {
        return Ok(RemoteCart::default());
    }

    serde_json::from_str(body).map_err(RemoteCartError::decode)
}

fn http_error(error: reqwest::Error) -> RemoteCartError {
    if error.is_decode() {
        RemoteCartError::decode(error)
    } else {
        RemoteCartError::transport(error)
    }
}

#[cfg(test)]
mod tests {
    use duka_cart::{identity::Session, remote::RemoteErrorClass};
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;

    fn client(base_url: &str, session: Session) -> Result<HttpCartClient, reqwest::Error> {
        HttpCartClient::new(
            HttpCartClientConfig {
                base_url: base_url.to_string(),
                timeout: Duration::from_secs(2),
            },
            Arc::new(session),
        )
    }

    #[test]
    fn urls_are_joined_without_double_slashes() -> TestResult {
        let client = client("https://shop.example.com/api/", Session::anonymous())?;

        assert_eq!(client.url("/cart"), "https://shop.example.com/api/cart");
        assert_eq!(
            client.url(&format!("/cart/item/{}", RemoteItemId::from(12))),
            "https://shop.example.com/api/cart/item/12"
        );

        Ok(())
    }

    #[tokio::test]
    async fn signed_out_requests_never_leave_the_process() -> TestResult {
        let client = client("http://127.0.0.1:9", Session::anonymous())?;

        let result = client.fetch_cart().await;

        assert!(
            matches!(result, Err(RemoteCartError::Unauthenticated)),
            "expected Unauthenticated, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn unreachable_server_is_transient() -> TestResult {
        let client = client("http://127.0.0.1:9", Session::signed_in("shopper", "token"))?;

        let result = client.clear_cart().await;

        let Err(error) = result else {
            return Err("expected a transport failure".into());
        };

        assert_eq!(error.class(), RemoteErrorClass::Transient);

        Ok(())
    }

    #[test]
    fn empty_and_null_bodies_are_empty_carts() -> TestResult {
        assert!(parse_cart("")?.is_empty());
        assert!(parse_cart("  null\n")?.is_empty());

        Ok(())
    }

    #[test]
    fn cart_body_accepts_string_prices() -> TestResult {
        let cart = parse_cart(
            r#"{
                "items": [
                    {"id": 3, "product_id": 7, "product_title": "Kikoi", "price": "12.50", "quantity": 2, "size": "M", "color": null}
                ],
                "total_items": 2,
                "total_amount": 25
            }"#,
        )?;

        let item = cart.items.first().ok_or("missing item")?;

        assert_eq!(item.price, Decimal::new(1250, 2));
        assert_eq!(item.title, "Kikoi");
        assert_eq!(cart.total_items, 2);

        Ok(())
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let result = parse_cart("{\"items\": 5}");

        assert!(
            matches!(result, Err(RemoteCartError::Decode(_))),
            "expected Decode, got {result:?}"
        );
    }
}
