use actix_web::{http::StatusCode, web, web::ServiceConfig};
use foodhub_order_engine::{traits::OrderApiError, OrderStatistics};

use super::{
    helpers::{get_request, json_body},
    mocks::{sample_order, MockOrderManager},
};
use crate::routes::{
    health,
    list_payment_methods,
    DelayedOrdersRoute,
    OrderByIdRoute,
    OrderStatisticsRoute,
    OrdersForUserRoute,
    OrdersSearchRoute,
};

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/health", |cfg| {
        cfg.service(health);
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn payment_methods_listing() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/payment-methods", |cfg| {
        cfg.service(list_payment_methods);
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let methods = json_body(&body);
    let methods = methods.as_array().unwrap();
    assert_eq!(methods.len(), 3);
    assert_eq!(methods[0]["id"], "card");
    assert_eq!(methods[2]["id"], "cash");
    assert_eq!(methods[2]["prepaid"], false);
}

#[actix_web::test]
async fn fetch_order_by_id() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/order/id/42", configure_order_by_id).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order = json_body(&body);
    assert_eq!(order["id"], 42);
    assert_eq!(order["user_id"], "alice");
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["status_label"], "Order Confirmed");
    assert_eq!(order["display_status"], "In progress");
    assert_eq!(order["pricing"]["total"], 727);
}

#[actix_web::test]
async fn fetch_missing_order_is_404() {
    let _ = env_logger::try_init().ok();
    let err = get_request("/order/id/999", configure_order_by_id).await.expect_err("Expected error");
    assert_eq!(err, "The data was not found. Order #999 not found");
}

#[actix_web::test]
async fn fetch_orders_for_user() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/user/alice", |cfg| {
        let mut manager = MockOrderManager::new();
        manager
            .expect_fetch_orders_for_user()
            .withf(|user_id| user_id == "alice")
            .returning(|_| Ok(vec![sample_order(2), sample_order(1)]));
        cfg.service(OrdersForUserRoute::<MockOrderManager>::new()).app_data(web::Data::new(manager));
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let orders = json_body(&body);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], 2);
    assert_eq!(orders[1]["id"], 1);
}

#[actix_web::test]
async fn search_orders_passes_the_filter_through() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/search/orders?user_id=alice&is_urgent=true", |cfg| {
        let mut manager = MockOrderManager::new();
        manager
            .expect_search_orders()
            .withf(|q| q.user_id.as_deref() == Some("alice") && q.is_urgent == Some(true))
            .returning(|_| Ok(vec![sample_order(7)]));
        cfg.service(OrdersSearchRoute::<MockOrderManager>::new()).app_data(web::Data::new(manager));
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn order_statistics_summary() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/stats", |cfg| {
        let mut manager = MockOrderManager::new();
        manager.expect_order_statistics().returning(|| {
            Ok(OrderStatistics {
                total_orders: 10,
                pending_orders: 2,
                active_orders: 3,
                delivered_orders: 4,
                cancelled_orders: 1,
                total_revenue: fh_common::Rupees::from(12_345),
            })
        });
        cfg.service(OrderStatisticsRoute::<MockOrderManager>::new()).app_data(web::Data::new(manager));
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let stats = json_body(&body);
    assert_eq!(stats["total_orders"], 10);
    assert_eq!(stats["total_revenue"], 12_345);
}

#[actix_web::test]
async fn delayed_orders_query() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/delayed", |cfg| {
        let mut manager = MockOrderManager::new();
        manager.expect_fetch_delayed_orders().returning(|_| Ok(vec![sample_order(3)]));
        cfg.service(DelayedOrdersRoute::<MockOrderManager>::new()).app_data(web::Data::new(manager));
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn backend_errors_are_500s() {
    let _ = env_logger::try_init().ok();
    let err = get_request("/order/id/1", |cfg| {
        let mut manager = MockOrderManager::new();
        manager
            .expect_fetch_order_by_id()
            .returning(|_| Err(OrderApiError::DatabaseError("the database fell over".to_string())));
        cfg.service(OrderByIdRoute::<MockOrderManager>::new()).app_data(web::Data::new(manager));
    })
    .await
    .expect_err("Expected error");
    assert!(err.contains("the database fell over"), "Unexpected error message: {err}");
}

fn configure_order_by_id(cfg: &mut ServiceConfig) {
    let mut manager = MockOrderManager::new();
    manager.expect_fetch_order_by_id().returning(|id| {
        if id.0 == 42 {
            Ok(Some(sample_order(42)))
        } else {
            Ok(None)
        }
    });
    cfg.service(OrderByIdRoute::<MockOrderManager>::new()).app_data(web::Data::new(manager));
}
