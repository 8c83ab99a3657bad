use cucumber::given;

use crate::cucumber::{checkout_world::Storefront, CheckoutWorld};

#[given("a fresh storefront")]
async fn fresh_storefront(world: &mut CheckoutWorld) {
    let system = Storefront::new().await;
    world.system = Some(system);
}
