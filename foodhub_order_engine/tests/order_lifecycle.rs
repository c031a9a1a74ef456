//! End-to-end tests for the order lifecycle against a real SQLite backend: creation with stock reservation,
//! payment events and their replays, fulfillment, cancellation with compensating stock release, and refunds.
use chrono::Duration;
use fh_common::Rupees;
use foodhub_order_engine::{
    db_types::*,
    events::EventProducers,
    pricing::PricingPolicy,
    test_utils::{prepare_test_env, random_db_path, seed_food},
    traits::{CatalogManagement, OrderFlowError, OrderManagement, RefundOutcome},
    OrderFlowApi,
    SqliteDatabase,
};

async fn setup() -> (OrderFlowApi<SqliteDatabase>, SqliteDatabase) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    seed_food(&db, "pizza-margherita", "Margherita Pizza", 299, 10, true).await;
    seed_food(&db, "garlic-naan", "Garlic Naan", 49, 3, true).await;
    seed_food(&db, "seasonal-kulfi", "Seasonal Kulfi", 99, 10, false).await;
    let api = OrderFlowApi::new(db.clone(), EventProducers::default());
    (api, db)
}

fn delivery() -> DeliveryDetails {
    DeliveryDetails {
        full_name: "Asha Rao".into(),
        phone: "9876543210".into(),
        street: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        zip_code: "560001".into(),
        country: "India".into(),
        delivery_instructions: Some("Ring the bell twice".into()),
    }
}

fn pizza_order(method: PaymentMethod) -> NewOrder {
    NewOrder {
        user_id: "user-1".into(),
        lines: vec![NewOrderLine { food_id: "pizza-margherita".into(), quantity: 2 }],
        delivery: delivery(),
        payment_method: method,
        is_urgent: false,
        notes: None,
        upi_id: None,
        card_last4: None,
        card_brand: None,
    }
}

async fn stock_of(db: &SqliteDatabase, food_id: &str) -> i64 {
    db.fetch_food(food_id).await.expect("Error fetching food").expect("Food not found").stock_quantity
}

#[tokio::test]
async fn create_order_snapshots_prices_and_reserves_stock() {
    let (api, db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Upi), &PricingPolicy::default()).await.unwrap();
    assert!(order.order_number.as_str().starts_with("ORD-"));
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.payment.payment_status, PaymentStatusType::Pending);
    assert_eq!(order.pricing.subtotal, Rupees::from(598));
    assert_eq!(order.pricing.delivery_fee, Rupees::from(99));
    assert_eq!(order.pricing.tax, Rupees::from(30));
    assert_eq!(order.pricing.total, Rupees::from(727));
    assert!(order.pricing.is_consistent());
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].name, "Margherita Pizza");
    assert_eq!(order.lines[0].unit_price, Rupees::from(299));
    assert_eq!(stock_of(&db, "pizza-margherita").await, 8);

    let fetched = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(fetched, order);
    let by_number = db.fetch_order_by_order_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(by_number.id, order.id);
}

#[tokio::test]
async fn large_orders_ship_free() {
    let (api, _db) = setup().await;
    let mut order = pizza_order(PaymentMethod::Card);
    order.lines[0].quantity = 4; // subtotal 1196
    let order = api.process_new_order(order, &PricingPolicy::default()).await.unwrap();
    assert_eq!(order.pricing.subtotal, Rupees::from(1196));
    assert_eq!(order.pricing.delivery_fee, Rupees::from(0));
}

#[tokio::test]
async fn cash_orders_are_confirmed_immediately() {
    let (api, _db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Cash), &PricingPolicy::default()).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Confirmed);
    // No prepayment happened, so the payment sub-state still waits for collection on delivery.
    assert_eq!(order.payment.payment_status, PaymentStatusType::Pending);
}

#[tokio::test]
async fn insufficient_stock_reserves_nothing() {
    let (api, db) = setup().await;
    let mut order = pizza_order(PaymentMethod::Upi);
    order.lines.push(NewOrderLine { food_id: "garlic-naan".into(), quantity: 5 });
    let err = api.process_new_order(order, &PricingPolicy::default()).await.unwrap_err();
    match err {
        OrderFlowError::InsufficientStock { food_id, requested, available } => {
            assert_eq!(food_id, "garlic-naan");
            assert_eq!(requested, 5);
            assert_eq!(available, 3);
        },
        other => panic!("Expected InsufficientStock, got {other:?}"),
    }
    // All-or-nothing: the pizza line must not have been decremented either.
    assert_eq!(stock_of(&db, "pizza-margherita").await, 10);
    assert_eq!(stock_of(&db, "garlic-naan").await, 3);
}

#[tokio::test]
async fn validation_happens_before_any_side_effect() {
    let (api, db) = setup().await;
    let mut order = pizza_order(PaymentMethod::Upi);
    order.delivery.phone = "".into();
    let err = api.process_new_order(order, &PricingPolicy::default()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::MissingDeliveryField("phone")));

    let mut order = pizza_order(PaymentMethod::Upi);
    order.delivery.country = "".into();
    let err = api.process_new_order(order, &PricingPolicy::default()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::MissingDeliveryField("country")));

    let mut order = pizza_order(PaymentMethod::Upi);
    order.lines[0].quantity = 0;
    let err = api.process_new_order(order, &PricingPolicy::default()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidPricing(_)));

    let mut order = pizza_order(PaymentMethod::Upi);
    order.lines[0].food_id = "paneer-65".into();
    let err = api.process_new_order(order, &PricingPolicy::default()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::FoodNotFound(_)));

    let mut order = pizza_order(PaymentMethod::Upi);
    order.lines[0].food_id = "seasonal-kulfi".into();
    let err = api.process_new_order(order, &PricingPolicy::default()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::FoodUnavailable(_)));

    assert_eq!(stock_of(&db, "pizza-margherita").await, 10);
}

#[tokio::test]
async fn captured_payment_confirms_the_order_exactly_once() {
    let (api, _db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Upi), &PricingPolicy::default()).await.unwrap();

    let event = PaymentEvent::captured("evt_001", "pay_P1", Some("txn_001".into()));
    let outcome = api.apply_payment_event(&order.id, event.clone()).await.unwrap();
    assert!(!outcome.duplicate);
    assert!(outcome.newly_confirmed);
    assert_eq!(outcome.order.status, OrderStatusType::Confirmed);
    assert_eq!(outcome.order.payment.payment_status, PaymentStatusType::Completed);
    assert_eq!(outcome.order.payment.payment_id.as_deref(), Some("pay_P1"));
    assert_eq!(outcome.order.payment.transaction_id.as_deref(), Some("txn_001"));

    // The same webhook delivered again is a no-op returning the same confirmed state.
    let replay = api.apply_payment_event(&order.id, event).await.unwrap();
    assert!(replay.duplicate);
    assert!(!replay.newly_confirmed);
    assert_eq!(replay.order, outcome.order);

    // A different delivery (new event id) re-reporting the same payment id is equally harmless.
    let second = PaymentEvent::captured("evt_002", "pay_P1", Some("txn_001".into()));
    let replay = api.apply_payment_event(&order.id, second).await.unwrap();
    assert!(replay.duplicate);
    assert_eq!(replay.order.status, OrderStatusType::Confirmed);
}

#[tokio::test]
async fn failed_payment_leaves_the_order_open_for_retry() {
    let (api, _db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Card), &PricingPolicy::default()).await.unwrap();

    let failed = PaymentEvent::failed("evt_f1", Some("pay_P9".into()), Some("card declined".into()));
    let outcome = api.apply_payment_event(&order.id, failed).await.unwrap();
    assert_eq!(outcome.order.payment.payment_status, PaymentStatusType::Failed);
    assert_eq!(outcome.order.status, OrderStatusType::Pending);

    // The retry succeeds and confirms the order.
    let captured = PaymentEvent::captured("evt_c1", "pay_P10", None);
    let outcome = api.apply_payment_event(&order.id, captured).await.unwrap();
    assert!(outcome.newly_confirmed);
    assert_eq!(outcome.order.payment.payment_status, PaymentStatusType::Completed);

    // A stale failure arriving after the capture changes nothing.
    let late_failure = PaymentEvent::failed("evt_f2", Some("pay_P9".into()), None);
    let outcome = api.apply_payment_event(&order.id, late_failure).await.unwrap();
    assert!(outcome.duplicate);
    assert_eq!(outcome.order.payment.payment_status, PaymentStatusType::Completed);
}

#[tokio::test]
async fn payment_event_for_missing_order_fails() {
    let (api, _db) = setup().await;
    let err = api
        .apply_payment_event(&OrderId(999), PaymentEvent::captured("evt_x", "pay_x", None))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderNotFound(_)));
}

#[tokio::test]
async fn status_updates_follow_the_chain_and_stamp_timestamps() {
    let (api, _db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Cash), &PricingPolicy::default()).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Confirmed);

    let order = api.update_status(&order.id, OrderStatusType::Preparing, None).await.unwrap();
    assert!(order.preparing_at.is_some());
    let order = api.update_status(&order.id, OrderStatusType::Ready, None).await.unwrap();
    let order = api.update_status(&order.id, OrderStatusType::OutForDelivery, None).await.unwrap();
    assert!(order.out_for_delivery_at.is_some());
    let order = api.update_status(&order.id, OrderStatusType::Delivered, Some("Left at the door".into())).await.unwrap();
    assert!(order.actual_delivery_at.is_some());
    assert_eq!(order.notes.as_deref(), Some("Left at the door"));

    // Delivered is terminal.
    let err = api.update_status(&order.id, OrderStatusType::Preparing, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::AlreadyTerminal(OrderStatusType::Delivered)));
}

#[tokio::test]
async fn skipping_states_is_rejected() {
    let (api, db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Upi), &PricingPolicy::default()).await.unwrap();
    let err = api.update_status(&order.id, OrderStatusType::Delivered, None).await.unwrap_err();
    match err {
        OrderFlowError::InvalidTransition { from, to } => {
            assert_eq!(from, OrderStatusType::Pending);
            assert_eq!(to, OrderStatusType::Delivered);
        },
        other => panic!("Expected InvalidTransition, got {other:?}"),
    }
    let unchanged = db.fetch_order_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn cancelling_releases_exactly_the_reserved_stock() {
    let (api, db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Upi), &PricingPolicy::default()).await.unwrap();
    assert_eq!(stock_of(&db, "pizza-margherita").await, 8);

    let cancelled = api.cancel_order(&order.id, "Changed my mind", CancelledBy::User).await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::User));
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Changed my mind"));
    assert!(cancelled.cancelled_at.is_some());
    // Unpaid order, so no refund is queued.
    assert_eq!(cancelled.refund.refund_status, RefundStatusType::None);
    // Reserve-then-cancel leaves the catalog exactly where it started.
    assert_eq!(stock_of(&db, "pizza-margherita").await, 10);

    let err = api.cancel_order(&order.id, "again", CancelledBy::User).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::AlreadyTerminal(OrderStatusType::Cancelled)));
}

#[tokio::test]
async fn cancelling_a_paid_order_queues_a_full_refund() {
    let (api, _db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Upi), &PricingPolicy::default()).await.unwrap();
    api.apply_payment_event(&order.id, PaymentEvent::captured("evt_1", "pay_1", None)).await.unwrap();

    let cancelled = api.cancel_order(&order.id, "Kitchen closed early", CancelledBy::Restaurant).await.unwrap();
    assert_eq!(cancelled.refund.refund_status, RefundStatusType::Pending);
    assert_eq!(cancelled.refund.refund_amount, Rupees::from(727));
    // The money has not moved yet; the payment stays completed until the refund is settled.
    assert_eq!(cancelled.payment.payment_status, PaymentStatusType::Completed);

    let settled = api.settle_refund(&order.id, RefundOutcome::Processed, None).await.unwrap();
    assert_eq!(settled.refund.refund_status, RefundStatusType::Processed);
    assert_eq!(settled.payment.payment_status, PaymentStatusType::Refunded);

    let err = api.settle_refund(&order.id, RefundOutcome::Processed, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidRefundState(RefundStatusType::Processed)));
}

#[tokio::test]
async fn failed_refunds_leave_the_payment_alone() {
    let (api, _db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Card), &PricingPolicy::default()).await.unwrap();
    api.apply_payment_event(&order.id, PaymentEvent::captured("evt_1", "pay_1", None)).await.unwrap();
    api.cancel_order(&order.id, "Out of ingredients", CancelledBy::Restaurant).await.unwrap();

    let settled =
        api.settle_refund(&order.id, RefundOutcome::Failed, Some("Gateway rejected the refund".into())).await.unwrap();
    assert_eq!(settled.refund.refund_status, RefundStatusType::Failed);
    assert_eq!(settled.payment.payment_status, PaymentStatusType::Completed);
    assert_eq!(settled.refund.refund_reason.as_deref(), Some("Gateway rejected the refund"));
}

#[tokio::test]
async fn refunds_cannot_be_settled_when_none_is_queued() {
    let (api, _db) = setup().await;
    let order = api.process_new_order(pizza_order(PaymentMethod::Upi), &PricingPolicy::default()).await.unwrap();
    let err = api.settle_refund(&order.id, RefundOutcome::Processed, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidRefundState(RefundStatusType::None)));
}

#[tokio::test]
async fn stale_unpaid_orders_are_swept_and_their_stock_returned() {
    let (api, db) = setup().await;
    let unpaid = api.process_new_order(pizza_order(PaymentMethod::Upi), &PricingPolicy::default()).await.unwrap();
    let cash = api.process_new_order(pizza_order(PaymentMethod::Cash), &PricingPolicy::default()).await.unwrap();
    assert_eq!(stock_of(&db, "pizza-margherita").await, 6);

    // A negative limit makes every pending order stale, without the test having to wait.
    let expired = api.expire_stale_orders(Duration::seconds(-1)).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, unpaid.id);
    assert_eq!(expired[0].cancelled_by, Some(CancelledBy::System));
    assert_eq!(stock_of(&db, "pizza-margherita").await, 8);

    // The confirmed cash order is not the sweep's business.
    let cash = db.fetch_order_by_id(&cash.id).await.unwrap().unwrap();
    assert_eq!(cash.status, OrderStatusType::Confirmed);
}

#[tokio::test]
async fn queries_and_statistics_reflect_the_order_book() {
    let (api, db) = setup().await;
    let delivered = api.process_new_order(pizza_order(PaymentMethod::Cash), &PricingPolicy::default()).await.unwrap();
    api.update_status(&delivered.id, OrderStatusType::Preparing, None).await.unwrap();
    api.update_status(&delivered.id, OrderStatusType::Ready, None).await.unwrap();
    api.update_status(&delivered.id, OrderStatusType::OutForDelivery, None).await.unwrap();
    api.update_status(&delivered.id, OrderStatusType::Delivered, None).await.unwrap();

    let pending = api.process_new_order(pizza_order(PaymentMethod::Upi), &PricingPolicy::default()).await.unwrap();
    let cancelled = api.process_new_order(pizza_order(PaymentMethod::Card), &PricingPolicy::default()).await.unwrap();
    api.cancel_order(&cancelled.id, "duplicate order", CancelledBy::User).await.unwrap();

    let mine = db.fetch_orders_for_user("user-1").await.unwrap();
    assert_eq!(mine.len(), 3);

    let unpaid = db.fetch_orders_by_payment_status(PaymentStatusType::Pending).await.unwrap();
    assert!(unpaid.iter().any(|o| o.id == pending.id));

    let query = foodhub_order_engine::OrderQueryFilter::default()
        .with_user_id("user-1")
        .with_status(OrderStatusType::Delivered);
    let found = db.search_orders(query).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, delivered.id);

    let stats = db.order_statistics().await.unwrap();
    assert_eq!(stats.total_orders, 3);
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.delivered_orders, 1);
    assert_eq!(stats.cancelled_orders, 1);
    assert_eq!(stats.total_revenue, Rupees::from(727));
}
