use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use foodhub_order_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;
use razorpay_tools::RazorpayApi;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    gateway::RazorpayGateway,
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        list_payment_methods,
        CancelOrderRoute,
        CreateOrderRoute,
        DelayedOrdersRoute,
        OrderByIdRoute,
        OrderByNumberRoute,
        OrderStatisticsRoute,
        OrdersForUserRoute,
        OrdersSearchRoute,
        PendingPaymentsRoute,
        ProcessRefundRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
    },
    webhook_routes::PaymentWebhookRoute,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(25, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _sweeper = start_expiry_worker(db.clone(), producers.clone(), config.unpaid_order_timeout);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let razorpay_api = RazorpayApi::new(config.razorpay_config.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = RazorpayGateway::new(razorpay_api);
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fh::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(config.clone()));
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(OrderByNumberRoute::<SqliteDatabase>::new())
            .service(OrdersForUserRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new())
            .service(OrderStatisticsRoute::<SqliteDatabase>::new())
            .service(PendingPaymentsRoute::<SqliteDatabase>::new())
            .service(DelayedOrdersRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(ProcessRefundRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(list_payment_methods);
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                "X-Razorpay-Signature",
                config.razorpay_config.webhook_secret.clone(),
                config.hmac_checks,
            ))
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(bind_addr)?
    .run();
    Ok(srv)
}

/// The default lifecycle hooks. Notification channels (push, SMS) hang off these; for now each milestone is
/// logged so operators can follow the order book from the server log.
fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_confirmed(|ev| {
        Box::pin(async move {
            info!("📬️ Order {} confirmed. The kitchen can start.", ev.order.order_number);
        })
    });
    hooks.on_order_annulled(|ev| {
        Box::pin(async move {
            info!("📬️ Order {} was cancelled.", ev.order.order_number);
        })
    });
    hooks.on_refund_settled(|ev| {
        Box::pin(async move {
            info!(
                "📬️ Refund of {} for order {} settled as '{}'.",
                ev.order.refund.refund_amount, ev.order.order_number, ev.order.refund.refund_status
            );
        })
    });
    hooks
}
