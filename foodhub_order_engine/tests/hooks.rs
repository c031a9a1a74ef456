//! Checks that lifecycle event hooks actually fire when orders move through the state machine.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use foodhub_order_engine::{
    db_types::{CancelledBy, DeliveryDetails, NewOrder, NewOrderLine, PaymentEvent, PaymentMethod},
    events::{EventHandlers, EventHooks},
    pricing::PricingPolicy,
    test_utils::{prepare_test_env, random_db_path, seed_food},
    OrderFlowApi,
    SqliteDatabase,
};

fn thali_order(method: PaymentMethod) -> NewOrder {
    NewOrder {
        user_id: "user-7".into(),
        lines: vec![NewOrderLine { food_id: "veg-thali".into(), quantity: 1 }],
        delivery: DeliveryDetails {
            full_name: "Ravi Menon".into(),
            phone: "9000000001".into(),
            street: "4 Brigade Road".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            zip_code: "560025".into(),
            country: "India".into(),
            delivery_instructions: None,
        },
        payment_method: method,
        is_urgent: false,
        notes: None,
        upi_id: None,
        card_last4: None,
        card_brand: None,
    }
}

#[tokio::test]
async fn confirmation_and_annulment_hooks_fire() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    seed_food(&db, "veg-thali", "Veg Thali", 199, 10, true).await;

    let confirmed = Arc::new(AtomicUsize::new(0));
    let annulled = Arc::new(AtomicUsize::new(0));
    let c = confirmed.clone();
    let a = annulled.clone();
    let mut hooks = EventHooks::default();
    hooks.on_order_confirmed(move |_ev| {
        let c = c.clone();
        Box::pin(async move {
            c.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_order_annulled(move |_ev| {
        let a = a.clone();
        Box::pin(async move {
            a.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = OrderFlowApi::new(db, producers);
    let policy = PricingPolicy::default();

    // A cash order confirms at creation; a prepaid one confirms on capture.
    api.process_new_order(thali_order(PaymentMethod::Cash), &policy).await.unwrap();
    let order = api.process_new_order(thali_order(PaymentMethod::Upi), &policy).await.unwrap();
    api.apply_payment_event(&order.id, PaymentEvent::captured("evt_hook", "pay_hook", None)).await.unwrap();
    // A replay must not fire the hook a second time.
    api.apply_payment_event(&order.id, PaymentEvent::captured("evt_hook", "pay_hook", None)).await.unwrap();
    api.cancel_order(&order.id, "hook test", CancelledBy::User).await.unwrap();

    // Give the async handlers a moment to drain.
    tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
    assert_eq!(confirmed.load(Ordering::SeqCst), 2);
    assert_eq!(annulled.load(Ordering::SeqCst), 1);
}
