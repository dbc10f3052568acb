//! Integration tests for Atelier.
//!
//! Each test runs the storefront library against a `wiremock` server standing
//! in for the hosted backend, with the cart persisted to a temporary
//! directory.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p atelier-integration-tests
//! ```

use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atelier_storefront::backend::BackendClient;
use atelier_storefront::config::BackendConfig;
use atelier_storefront::services::{CartService, Checkout};
use atelier_storefront::store::{CartStore, FileStore};

/// A mock backend plus a scratch directory for the cart.
pub struct TestContext {
    pub server: MockServer,
    pub client: BackendClient,
    cart_dir: TempDir,
}

impl TestContext {
    /// Start a mock backend and a client pointed at it.
    ///
    /// # Panics
    ///
    /// Panics if the scratch directory or the client cannot be created.
    #[allow(clippy::unwrap_used)]
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let config = BackendConfig {
            base_url: Url::parse(&format!("{}/api/", server.uri())).unwrap(),
            api_key: None,
            timeout: Duration::from_secs(5),
        };
        Self {
            client: BackendClient::new(&config).unwrap(),
            server,
            cart_dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Load the persisted cart, as a fresh process would.
    #[must_use]
    pub fn open_cart(&self) -> CartService<FileStore> {
        CartService::load(CartStore::new(FileStore::new(self.cart_dir.path())))
    }

    /// A checkout over the mock backend.
    #[must_use]
    pub fn checkout(&self) -> Checkout<BackendClient> {
        Checkout::new(self.client.clone())
    }

    /// Serve `product` from `GET /api/products/{id}`.
    pub async fn serve_product(&self, product: Value) {
        let id = product
            .get("_id")
            .or_else(|| product.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api/products/{id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true, "data": { "product": product } })),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer `POST /api/orders` with `status` and `body`.
    pub async fn answer_orders(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/api/orders"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

/// A catalog product as the backend sends it, with list fields as JSON text
/// the way older records store them.
#[must_use]
pub fn raw_product(id: &str, stock: i64, price: i64) -> Value {
    json!({
        "_id": id,
        "name": format!("Product {id}"),
        "price": price,
        "category": "tops",
        "sizes": "[\"S\",\"M\",\"L\"]",
        "colors": "[]",
        "images": ["/img/front.jpg"],
        "stock": stock,
        "isActive": true,
        "createdAt": "2024-03-01T10:00:00Z"
    })
}
