use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::*;

use super::{Cart, PricingPolicy};
use crate::db_types::UserId;

/// Per-user cart storage. Cheap to clone; clones share the same carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    carts: Arc<Mutex<HashMap<UserId, Cart>>>,
    policy: PricingPolicy,
    currency: String,
}

impl CartRepository {
    pub fn new(policy: PricingPolicy, currency: &str) -> Self {
        Self { carts: Arc::new(Mutex::new(HashMap::new())), policy, currency: currency.to_string() }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Runs `f` against the user's cart, creating an empty cart first if necessary.
    pub fn with_cart<R, F>(&self, user: &UserId, f: F) -> R
    where F: FnOnce(&mut Cart) -> R {
        let mut carts = self.lock();
        let cart = carts.entry(user.clone()).or_insert_with(|| Cart::new(self.policy, &self.currency));
        f(cart)
    }

    /// A copy of the user's cart. Users without a cart get an empty one.
    pub fn snapshot(&self, user: &UserId) -> Cart {
        self.lock().get(user).cloned().unwrap_or_else(|| Cart::new(self.policy, &self.currency))
    }

    /// Empties the user's cart. Returns true if there was anything to remove.
    pub fn clear(&self, user: &UserId) -> bool {
        let removed = self.lock().remove(user).map(|c| !c.is_empty()).unwrap_or(false);
        debug!("🛒 Cleared cart for {user} (had items: {removed})");
        removed
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, Cart>> {
        // Cart mutations commit in a single assignment, so a poisoned map is still consistent.
        self.carts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CartRepository {
    fn default() -> Self {
        Self::new(PricingPolicy::default(), storefront_common::DEFAULT_CURRENCY_CODE)
    }
}

#[cfg(test)]
mod test {
    use storefront_common::Cents;

    use super::*;

    #[test]
    fn carts_are_per_user() {
        let repo = CartRepository::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        repo.with_cart(&alice, |c| c.add_line("a".into(), Cents::from(100), 1)).unwrap();
        assert_eq!(repo.snapshot(&alice).lines().len(), 1);
        assert!(repo.snapshot(&bob).is_empty());
    }

    #[test]
    fn clear_reports_whether_anything_was_removed() {
        let repo = CartRepository::default();
        let alice = UserId::from("alice");
        repo.with_cart(&alice, |c| c.add_line("a".into(), Cents::from(100), 1)).unwrap();
        let shared = repo.clone();
        assert!(shared.clear(&alice));
        assert!(!repo.clear(&alice));
        assert!(repo.snapshot(&alice).is_empty());
    }
}
