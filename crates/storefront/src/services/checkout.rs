//! Checkout orchestration.
//!
//! ```text
//! Idle -> ValidatingStock -> Blocked
//!                         -> Submitting -> Confirmed
//!                                       -> Failed
//! ```
//!
//! A blocked checkout is re-validated when the cart changes, or recovered in
//! one step with [`Checkout::resolve_shortfalls`]. A failed order leaves the
//! cart alone and may be submitted again. Nothing is retried automatically.
//!
//! State changes are published on a `watch` channel so a UI can follow them.

use std::fmt;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use atelier_core::{
    Cart, CustomerDetails, Email, FieldError, OrderConfirmation, OrderRequest, Shortfall,
};

use crate::backend::{Catalog, OrderError, OrderGateway};
use crate::error::{add_breadcrumb, capture};
use crate::services::cart::CartService;
use crate::services::klaviyo::{KlaviyoClient, Subscriber};
use crate::services::reconcile::{StockCheck, StockReconciler, apply_fresh_stock};
use crate::store::KeyValueStore;

/// Why checkout cannot proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The catalog cannot supply what the cart asks for.
    Shortfalls(Vec<Shortfall>),
    /// Stock could not be checked at all.
    Unverified,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shortfalls(shortfalls) => {
                write!(f, "not enough stock for {} product(s)", shortfalls.len())
            }
            Self::Unverified => f.write_str("could not verify stock"),
        }
    }
}

/// A rejected or failed order, as shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutFailure {
    /// The order service's message verbatim, or a generic fallback.
    pub message: String,
    pub code: Option<String>,
    /// Form field the service blamed, if any.
    pub field: Option<String>,
}

impl From<&OrderError> for CheckoutFailure {
    fn from(err: &OrderError) -> Self {
        let (code, field) = match err {
            OrderError::Rejected { code, field, .. } => (code.clone(), field.clone()),
            _ => (None, None),
        };
        Self {
            message: err.user_message(),
            code,
            field,
        }
    }
}

/// Where a checkout is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckoutState {
    #[default]
    Idle,
    ValidatingStock,
    Blocked(BlockReason),
    Submitting,
    Confirmed(OrderConfirmation),
    Failed(CheckoutFailure),
}

impl CheckoutState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ValidatingStock => "validating_stock",
            Self::Blocked(_) => "blocked",
            Self::Submitting => "submitting",
            Self::Confirmed(_) => "confirmed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Errors that can occur during checkout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid checkout details: {0}")]
    InvalidDetails(#[from] FieldError),

    #[error("checkout blocked: {0}")]
    Blocked(BlockReason),

    #[error("order failed: {}", .0.message)]
    Failed(CheckoutFailure),

    #[error("cannot {action} while checkout is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
}

impl CheckoutError {
    /// Whether the error comes from a backend fault rather than the cart or
    /// the shopper's input.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Blocked(BlockReason::Unverified))
    }
}

/// Drives a cart through stock validation and order submission.
pub struct Checkout<B, N = KlaviyoClient> {
    reconciler: StockReconciler<B>,
    newsletter: Option<N>,
    state: watch::Sender<CheckoutState>,
    last_check: Option<StockCheck>,
    checked_revision: Option<u64>,
}

impl<B, N> fmt::Debug for Checkout<B, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkout")
            .field("state", &*self.state.borrow())
            .field("newsletter", &self.newsletter.is_some())
            .field("checked_revision", &self.checked_revision)
            .finish_non_exhaustive()
    }
}

impl<B> Checkout<B> {
    /// A checkout against `backend` with no newsletter sign-up.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_newsletter(backend, None)
    }
}

impl<B, N> Checkout<B, N> {
    /// A checkout that signs opted-in customers up through `newsletter`.
    #[must_use]
    pub fn with_newsletter(backend: B, newsletter: Option<N>) -> Self {
        let (state, _) = watch::channel(CheckoutState::Idle);
        Self {
            reconciler: StockReconciler::new(backend),
            newsletter,
            state,
            last_check: None,
            checked_revision: None,
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        self.state.borrow().clone()
    }

    /// Follow state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    /// The most recent stock check, if it produced a verdict.
    #[must_use]
    pub const fn last_check(&self) -> Option<&StockCheck> {
        self.last_check.as_ref()
    }

    /// Go back to `Idle`, forgetting the last check. Needed after a
    /// confirmed order before the next checkout.
    pub fn reset(&mut self) {
        self.last_check = None;
        self.checked_revision = None;
        self.transition(CheckoutState::Idle);
    }

    fn transition(&self, next: CheckoutState) {
        let previous = self.state.send_replace(next);
        debug!(
            from = previous.name(),
            to = self.state.borrow().name(),
            "Checkout state changed"
        );
    }

    fn blocked(&self) -> Option<BlockReason> {
        match &*self.state.borrow() {
            CheckoutState::Blocked(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}

impl<B, N> Checkout<B, N>
where
    B: Catalog + OrderGateway,
    N: Subscriber + Clone + 'static,
{
    /// Validate stock and, if the cart is clean, place the order.
    ///
    /// On success the cart is cleared. On an order failure the cart is left
    /// as it was and the state is `Failed` until the next submit.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`] / [`CheckoutError::InvalidDetails`] before anything runs
    /// - [`CheckoutError::Blocked`] when stock is short or could not be checked
    /// - [`CheckoutError::Failed`] when the order service refused the order
    /// - [`CheckoutError::InvalidState`] after a confirmed order until [`Checkout::reset`]
    #[instrument(skip_all, fields(lines = cart.cart().len()))]
    pub async fn submit<S: KeyValueStore>(
        &mut self,
        cart: &mut CartService<S>,
        details: &CustomerDetails,
    ) -> Result<OrderConfirmation, CheckoutError> {
        let current = self.state();
        if matches!(current, CheckoutState::Confirmed(_)) {
            return Err(CheckoutError::InvalidState {
                action: "submit",
                state: current.name(),
            });
        }
        if cart.cart().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        details.validate()?;

        if !matches!(current, CheckoutState::Idle) {
            self.transition(CheckoutState::Idle);
        }
        self.verify(cart.cart(), cart.revision()).await?;

        self.transition(CheckoutState::Submitting);
        add_breadcrumb("checkout", "Submitting order", None);
        let order = OrderRequest::from_cart(cart.cart(), details);

        match self.reconciler.catalog().create_order(&order).await {
            Ok(confirmation) => {
                info!(
                    order_number = %confirmation.order_number,
                    order_id = %confirmation.id,
                    total = %order.total_amount,
                    "Order confirmed"
                );
                cart.clear();
                self.last_check = None;
                self.transition(CheckoutState::Confirmed(confirmation.clone()));
                if details.subscribe_newsletter {
                    self.sign_up(details.email.as_ref());
                }
                Ok(confirmation)
            }
            Err(e) => {
                capture(&e, "Order submission failed");
                let failure = CheckoutFailure::from(&e);
                self.transition(CheckoutState::Failed(failure.clone()));
                Err(CheckoutError::Failed(failure))
            }
        }
    }

    /// Tell the checkout the cart changed. While blocked, the cart is
    /// validated again; a clean result returns the checkout to `Idle`.
    ///
    /// Does nothing in any other state, or when the cart has not changed
    /// since it was last checked.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Blocked`] when the changed cart is still blocked.
    pub async fn cart_changed<S: KeyValueStore>(
        &mut self,
        cart: &CartService<S>,
    ) -> Result<(), CheckoutError> {
        if self.blocked().is_none() || self.checked_revision == Some(cart.revision()) {
            return Ok(());
        }
        self.recheck(cart).await
    }

    /// Validate a blocked cart again, whether or not it changed. This is how
    /// an unverified check is retried without submitting.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Blocked`] when the cart is still blocked, or
    /// [`CheckoutError::InvalidState`] when the checkout is not blocked.
    pub async fn recheck<S: KeyValueStore>(
        &mut self,
        cart: &CartService<S>,
    ) -> Result<(), CheckoutError> {
        if self.blocked().is_none() {
            return Err(self.invalid("recheck"));
        }
        if cart.cart().is_empty() {
            self.reset();
            return Ok(());
        }
        self.verify(cart.cart(), cart.revision()).await?;
        self.transition(CheckoutState::Idle);
        Ok(())
    }

    /// One-step recovery from shortfalls: fold the last check's catalog data
    /// into the cart, commit it, and validate again.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] unless blocked on shortfalls,
    /// or [`CheckoutError::Blocked`] if stock moved again in the meantime.
    pub async fn resolve_shortfalls<S: KeyValueStore>(
        &mut self,
        cart: &mut CartService<S>,
    ) -> Result<(), CheckoutError> {
        if !matches!(self.blocked(), Some(BlockReason::Shortfalls(_))) {
            return Err(self.invalid("resolve shortfalls"));
        }
        let Some(check) = self.last_check.take() else {
            return Err(self.invalid("resolve shortfalls"));
        };

        let before = cart.total_items();
        cart.commit(apply_fresh_stock(cart.cart(), &check.fresh_products));
        cart.force_clean_cart();
        info!(
            before,
            after = cart.total_items(),
            "Cart adjusted to available stock"
        );
        add_breadcrumb("checkout", "Resolved stock shortfalls", None);

        self.recheck(cart).await
    }

    async fn verify(&mut self, cart: &Cart, revision: u64) -> Result<(), CheckoutError> {
        self.transition(CheckoutState::ValidatingStock);
        let outcome = self.reconciler.check(cart).await;
        self.checked_revision = Some(revision);

        let reason = match outcome {
            Ok(check) if check.is_available() => {
                self.last_check = Some(check);
                return Ok(());
            }
            Ok(check) => {
                let reason = BlockReason::Shortfalls(check.result.shortfalls.clone());
                warn!(shortfalls = check.result.shortfalls.len(), "Checkout blocked on stock");
                self.last_check = Some(check);
                reason
            }
            Err(e) => {
                capture(&e, "Stock verification failed");
                self.last_check = None;
                BlockReason::Unverified
            }
        };

        self.transition(CheckoutState::Blocked(reason.clone()));
        Err(CheckoutError::Blocked(reason))
    }

    fn sign_up(&self, email: Option<&Email>) {
        let (Some(newsletter), Some(email)) = (self.newsletter.clone(), email.cloned()) else {
            return;
        };
        tokio::spawn(async move {
            match newsletter.subscribe(&email).await {
                Ok(()) => info!("Newsletter subscription recorded"),
                Err(e) => warn!(error = %e, "Newsletter subscription failed"),
            }
        });
    }

    fn invalid(&self, action: &'static str) -> CheckoutError {
        CheckoutError::InvalidState {
            action,
            state: self.state.borrow().name(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use atelier_core::{OrderId, PhoneNumber, Price, Product, ProductId};
    use tokio::sync::mpsc;

    use super::*;
    use crate::backend::CatalogError;
    use crate::services::klaviyo::KlaviyoError;
    use crate::store::{CartStore, MemoryStore};

    enum OrderReply {
        Confirm,
        Reject { code: &'static str, message: &'static str },
        Down,
    }

    struct FakeBackend {
        stock: Mutex<HashMap<ProductId, Product>>,
        catalog_down: bool,
        reply: OrderReply,
        orders: AtomicUsize,
    }

    impl FakeBackend {
        fn new(products: &[Product], reply: OrderReply) -> Self {
            Self {
                stock: Mutex::new(products.iter().map(|p| (p.id.clone(), p.clone())).collect()),
                catalog_down: false,
                reply,
                orders: AtomicUsize::new(0),
            }
        }

        fn restock(&self, product: Product) {
            self.stock.lock().unwrap().insert(product.id.clone(), product);
        }
    }

    impl Catalog for FakeBackend {
        async fn fetch_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
            if self.catalog_down {
                return Err(CatalogError::Parse("unexpected body".to_string()));
            }
            self.stock
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(id.clone()))
        }
    }

    impl OrderGateway for FakeBackend {
        async fn create_order(&self, _order: &OrderRequest) -> Result<OrderConfirmation, OrderError> {
            self.orders.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                OrderReply::Confirm => Ok(OrderConfirmation {
                    order_number: "ATL-1001".to_string(),
                    id: OrderId::parse("ord_1").unwrap(),
                }),
                OrderReply::Reject { code, message } => Err(OrderError::Rejected {
                    code: Some(code.to_string()),
                    message: Some(message.to_string()),
                    details: None,
                    field: None,
                }),
                OrderReply::Down => Err(OrderError::Api {
                    status: 502,
                    message: String::new(),
                }),
            }
        }
    }

    #[derive(Clone)]
    struct FakeNewsletter(mpsc::UnboundedSender<Email>);

    impl Subscriber for FakeNewsletter {
        async fn subscribe(&self, email: &Email) -> Result<(), KlaviyoError> {
            self.0.send(email.clone()).unwrap();
            Ok(())
        }
    }

    fn product(id: &str, stock: u32) -> Product {
        Product {
            id: ProductId::parse(id).unwrap(),
            name: format!("Product {id}"),
            price: Price::from_minor(4500),
            category: "knitwear".to_string(),
            sizes: vec!["M".to_string()],
            colors: None,
            images: vec![],
            stock,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn details() -> CustomerDetails {
        CustomerDetails {
            name: "Grace Hopper".to_string(),
            phone: PhoneNumber::parse("555-0100-22").unwrap(),
            email: Some(Email::parse("grace@example.org").unwrap()),
            delivery_address: "1 Compiler Way".to_string(),
            delivery_zone: "north".to_string(),
            delivery_fee: Price::from_minor(300),
            subscribe_newsletter: false,
        }
    }

    fn cart_with(products: &[(Product, u32)]) -> CartService<MemoryStore> {
        let mut cart = CartService::load(CartStore::new(MemoryStore::new()));
        for (product, quantity) in products {
            cart.add_item(product, "M", *quantity, None);
        }
        cart
    }

    #[tokio::test]
    async fn test_submit_confirms_and_clears_cart() {
        let backend = FakeBackend::new(&[product("p1", 10)], OrderReply::Confirm);
        let mut checkout = Checkout::new(&backend);
        let mut cart = cart_with(&[(product("p1", 10), 2)]);

        let confirmation = checkout.submit(&mut cart, &details()).await.unwrap();

        assert_eq!(confirmation.order_number, "ATL-1001");
        assert!(cart.cart().is_empty());
        assert!(matches!(checkout.state(), CheckoutState::Confirmed(_)));

        let again = checkout.submit(&mut cart, &details()).await.unwrap_err();
        assert!(matches!(again, CheckoutError::InvalidState { action: "submit", .. }));
        checkout.reset();
        assert_eq!(checkout.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_rejected_order_keeps_cart_and_message() {
        let backend = FakeBackend::new(
            &[product("p1", 10)],
            OrderReply::Reject {
                code: "OUT_OF_STOCK",
                message: "X",
            },
        );
        let mut checkout = Checkout::new(&backend);
        let mut cart = cart_with(&[(product("p1", 10), 2)]);
        let before = cart.cart().clone();

        let err = checkout.submit(&mut cart, &details()).await.unwrap_err();

        let failure = CheckoutFailure {
            message: "X".to_string(),
            code: Some("OUT_OF_STOCK".to_string()),
            field: None,
        };
        assert_eq!(err, CheckoutError::Failed(failure.clone()));
        assert_eq!(checkout.state(), CheckoutState::Failed(failure));
        assert_eq!(cart.cart(), &before);

        // Submitting again goes back through validation
        let _ = checkout.submit(&mut cart, &details()).await;
        assert_eq!(backend.orders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unexplained_failure_uses_generic_message() {
        let backend = FakeBackend::new(&[product("p1", 10)], OrderReply::Down);
        let mut checkout = Checkout::new(&backend);
        let mut cart = cart_with(&[(product("p1", 10), 1)]);

        let err = checkout.submit(&mut cart, &details()).await.unwrap_err();
        let CheckoutError::Failed(failure) = err else {
            panic!("expected an order failure");
        };
        assert_eq!(failure.message, crate::backend::GENERIC_ORDER_FAILURE);
    }

    #[tokio::test]
    async fn test_shortfall_blocks_then_resolves() {
        let backend = FakeBackend::new(&[product("p1", 3)], OrderReply::Confirm);
        let mut checkout = Checkout::new(&backend);
        let mut cart = cart_with(&[(product("p1", 10), 8)]);

        let err = checkout.submit(&mut cart, &details()).await.unwrap_err();
        let CheckoutError::Blocked(BlockReason::Shortfalls(shortfalls)) = err else {
            panic!("expected a shortfall block");
        };
        assert_eq!(shortfalls[0].requested_quantity, 8);
        assert_eq!(shortfalls[0].available_stock, 3);
        assert_eq!(backend.orders.load(Ordering::SeqCst), 0);

        checkout.resolve_shortfalls(&mut cart).await.unwrap();
        assert_eq!(cart.total_items(), 3);
        assert_eq!(checkout.state(), CheckoutState::Idle);

        checkout.submit(&mut cart, &details()).await.unwrap();
        assert_eq!(backend.orders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_last_check_follows_verdict() {
        let backend = FakeBackend::new(&[product("p1", 1)], OrderReply::Confirm);
        let mut checkout = Checkout::new(&backend);
        let mut cart = cart_with(&[(product("p1", 10), 4)]);
        assert!(checkout.last_check().is_none());

        assert!(checkout.submit(&mut cart, &details()).await.is_err());
        let check = checkout.last_check().unwrap();
        assert_eq!(check.shortfalls()[0].available_stock, 1);
        assert!(check.unknown.is_empty());

        checkout.reset();
        assert!(checkout.last_check().is_none());
    }

    #[tokio::test]
    async fn test_cart_change_revalidates_while_blocked() {
        let p1 = product("p1", 10);
        let backend = FakeBackend::new(&[product("p1", 2)], OrderReply::Confirm);
        let mut checkout = Checkout::new(&backend);
        let mut cart = cart_with(&[(p1.clone(), 5)]);

        assert!(checkout.submit(&mut cart, &details()).await.is_err());

        // Unchanged cart: nothing to do, still blocked
        checkout.cart_changed(&cart).await.unwrap();
        assert!(matches!(checkout.state(), CheckoutState::Blocked(_)));

        cart.update_quantity(&p1.id, "M", 4, None);
        assert!(checkout.cart_changed(&cart).await.is_err());

        backend.restock(product("p1", 4));
        cart.update_quantity(&p1.id, "M", 3, None);
        checkout.cart_changed(&cart).await.unwrap();
        assert_eq!(checkout.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_catalog_outage_is_unverified() {
        let mut backend = FakeBackend::new(&[product("p1", 10)], OrderReply::Confirm);
        backend.catalog_down = true;
        let mut checkout = Checkout::new(&backend);
        let mut cart = cart_with(&[(product("p1", 10), 1)]);

        let err = checkout.submit(&mut cart, &details()).await.unwrap_err();
        assert_eq!(err, CheckoutError::Blocked(BlockReason::Unverified));
        assert!(err.is_fault());
        assert!(matches!(
            checkout.resolve_shortfalls(&mut cart).await,
            Err(CheckoutError::InvalidState { .. })
        ));
        assert_eq!(cart.total_items(), 1);
    }

    #[tokio::test]
    async fn test_rejects_empty_cart_and_bad_details() {
        let backend = FakeBackend::new(&[product("p1", 10)], OrderReply::Confirm);
        let mut checkout = Checkout::new(&backend);

        let mut empty = cart_with(&[]);
        assert_eq!(
            checkout.submit(&mut empty, &details()).await.unwrap_err(),
            CheckoutError::EmptyCart
        );

        let mut cart = cart_with(&[(product("p1", 10), 1)]);
        let mut bad = details();
        bad.name = " ".to_string();
        let err = checkout.submit(&mut cart, &bad).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidDetails(FieldError { field: "customerName", .. })));
        assert_eq!(checkout.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_state_changes_are_published() {
        let backend = FakeBackend::new(&[product("p1", 10)], OrderReply::Confirm);
        let mut checkout = Checkout::new(&backend);
        let mut states = checkout.subscribe();
        let mut cart = cart_with(&[(product("p1", 10), 1)]);

        checkout.submit(&mut cart, &details()).await.unwrap();
        assert!(states.has_changed().unwrap());
        assert!(matches!(*states.borrow_and_update(), CheckoutState::Confirmed(_)));
    }

    #[tokio::test]
    async fn test_newsletter_signup_after_confirmation() {
        let backend = FakeBackend::new(&[product("p1", 10)], OrderReply::Confirm);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut checkout = Checkout::with_newsletter(&backend, Some(FakeNewsletter(tx)));
        let mut cart = cart_with(&[(product("p1", 10), 1)]);
        let mut opted_in = details();
        opted_in.subscribe_newsletter = true;

        checkout.submit(&mut cart, &opted_in).await.unwrap();

        let email = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(email.as_str(), "grace@example.org");
    }
}
