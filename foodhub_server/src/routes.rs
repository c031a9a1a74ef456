//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database calls, gateway
//! round-trips) must be expressed as futures or asynchronous functions so that worker threads can interleave requests.

use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use fh_common::INR_CURRENCY_CODE;
use foodhub_order_engine::{
    db_types::{CancelledBy, NewOrder, OrderId, OrderNumber, PaymentEvent, PaymentStatusType, RefundStatusType},
    traits::{LifecycleDatabase, OrderFlowError, OrderManagement, PaymentGateway, PaymentGatewayError, RefundOutcome, RefundSpeed},
    OrderFlowApi,
    OrderQueryFilter,
};
use log::*;

use crate::{
    config::ServerConfig,
    data_objects::{
        payment_methods,
        ModifyOrderParams,
        NewOrderRequest,
        OrderCreatedResponse,
        OrderResult,
        PaymentIntentResult,
        UpdateStatusParams,
        VerifyPaymentParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Create  ----------------------------------------------------
route!(create_order => Post "/orders" impl LifecycleDatabase, PaymentGateway);
/// Route handler for order creation.
///
/// Validation, price snapshotting and stock reservation all happen atomically in the engine. For prepaid
/// orders a payment intent is then registered with the gateway and returned so that the client can open
/// checkout. If the gateway is unreachable the order still stands (the stock is held); it will either be paid
/// later or swept by the expiry worker.
pub async fn create_order<B, G>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<G>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: LifecycleDatabase,
    G: PaymentGateway,
{
    let request = body.into_inner();
    debug!("💻️ POST create order for user {} with {} items", request.user_id, request.items.len());
    let new_order = NewOrder::from(request);
    let prepaid = new_order.payment_method.is_prepaid();
    let order = api.process_new_order(new_order, &config.pricing).await?;
    let payment = if prepaid {
        match gateway.create_intent(order.pricing.total, INR_CURRENCY_CODE, order.order_number.as_str()).await {
            Ok(intent) => Some(PaymentIntentResult::new(
                intent,
                order.pricing.total.to_paise(),
                INR_CURRENCY_CODE,
                &config.razorpay_config.key_id,
            )),
            Err(e) => {
                warn!(
                    "💻️ Could not register a payment intent for order {}. The client must retry payment. {e}",
                    order.order_number
                );
                None
            },
        }
    } else {
        None
    };
    let result = OrderCreatedResponse { order: OrderResult::new(order, Utc::now()), payment };
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Queries  ----------------------------------------------------
route!(order_by_id => Get "/order/id/{order_id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<i64>,
    api: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET order_by_id({order_id})");
    let order = api
        .fetch_order_by_id(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} not found")))?;
    Ok(HttpResponse::Ok().json(OrderResult::new(order, Utc::now())))
}

route!(order_by_number => Get "/order/number/{order_number}" impl OrderManagement);
pub async fn order_by_number<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let number = OrderNumber(path.into_inner());
    debug!("💻️ GET order_by_number({})", number.as_str());
    let order = api
        .fetch_order_by_order_number(&number)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {} not found", number.as_str())))?;
    Ok(HttpResponse::Ok().json(OrderResult::new(order, Utc::now())))
}

route!(orders_for_user => Get "/orders/user/{user_id}" impl OrderManagement);
/// All orders for a user, newest first. Ownership checks are the caller's job; this service trusts its
/// upstream to only ask for users it may see.
pub async fn orders_for_user<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET orders for user {user_id}");
    let orders = api.fetch_orders_for_user(&user_id).await?;
    Ok(HttpResponse::Ok().json(as_order_results(orders)))
}

route!(orders_search => Get "/search/orders" impl OrderManagement);
pub async fn orders_search<B: OrderManagement>(
    query: web::Query<OrderQueryFilter>,
    api: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders search for [{query}]");
    let orders = api.search_orders(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(as_order_results(orders)))
}

route!(order_statistics => Get "/orders/stats" impl OrderManagement);
pub async fn order_statistics<B: OrderManagement>(api: web::Data<B>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET order statistics");
    let stats = api.order_statistics().await?;
    Ok(HttpResponse::Ok().json(stats))
}

route!(pending_payments => Get "/orders/pending-payments" impl OrderManagement);
/// Orders whose payment is still pending. Useful for reconciling against the gateway dashboard.
pub async fn pending_payments<B: OrderManagement>(api: web::Data<B>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET pending payments");
    let orders = api.fetch_orders_by_payment_status(PaymentStatusType::Pending).await?;
    Ok(HttpResponse::Ok().json(as_order_results(orders)))
}

route!(delayed_orders => Get "/orders/delayed" impl OrderManagement);
/// Orders past their estimated delivery time that are not terminal yet.
pub async fn delayed_orders<B: OrderManagement>(api: web::Data<B>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET delayed orders");
    let orders = api.fetch_delayed_orders(Utc::now()).await?;
    Ok(HttpResponse::Ok().json(as_order_results(orders)))
}

#[get("/payment-methods")]
pub async fn list_payment_methods() -> impl Responder {
    trace!("💻️ GET payment methods");
    HttpResponse::Ok().json(payment_methods())
}

fn as_order_results(orders: Vec<foodhub_order_engine::db_types::Order>) -> Vec<OrderResult> {
    let now = Utc::now();
    orders.into_iter().map(|o| OrderResult::new(o, now)).collect()
}

//----------------------------------------------   Modify  ----------------------------------------------------
route!(cancel_order => Post "/cancel" impl LifecycleDatabase);
/// Order cancellation.
///
/// The order is marked cancelled, its reserved stock is released, and if the payment had already completed a
/// refund for the full order total is queued. The order-annulled event fires.
///
/// ## Parameters
/// * `order_id` - The order id to cancel.
/// * `reason` - The reason for the cancellation.
/// * `cancelled_by` - Who asked for it (defaults to the user).
pub async fn cancel_order<B: LifecycleDatabase>(
    body: web::Json<ModifyOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ModifyOrderParams { order_id, reason, cancelled_by } = body.into_inner();
    let cancelled_by = cancelled_by.unwrap_or(CancelledBy::User);
    info!("💻️ Cancel order request for {order_id}. Reason: {reason}");
    let order = api.cancel_order(&order_id, &reason, cancelled_by).await.map_err(|e| {
        debug!("💻️ Could not cancel order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(OrderResult::new(order, Utc::now())))
}

route!(update_order_status => Patch "/status" impl LifecycleDatabase);
/// Advance an order one step along the fulfillment chain. Skipping steps, moving backwards or moving out of
/// a terminal state is rejected with a 409.
///
/// *Note*: the HTTP method used for this endpoint is PATCH, rather than POST.
pub async fn update_order_status<B: LifecycleDatabase>(
    body: web::Json<UpdateStatusParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let UpdateStatusParams { order_id, status, notes } = body.into_inner();
    info!("💻️ Update status request for {order_id} to '{status}'");
    let order = api.update_status(&order_id, status, notes).await.map_err(|e| {
        debug!("💻️ Could not update order status. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(OrderResult::new(order, Utc::now())))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(verify_payment => Post "/payment/verify" impl LifecycleDatabase, PaymentGateway);
/// The checkout-callback verification endpoint.
///
/// The client posts the gateway's callback fields after checkout completes. The signature is checked first
/// (constant time, in the gateway adapter); a bad signature is a 401 and nothing is recorded. A good
/// signature is converted into a captured payment event keyed on the payment id, so re-posting the same
/// callback is a no-op.
pub async fn verify_payment<B, G>(
    body: web::Json<VerifyPaymentParams>,
    api: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<G>,
) -> Result<HttpResponse, ServerError>
where
    B: LifecycleDatabase,
    G: PaymentGateway,
{
    let VerifyPaymentParams { order_id, razorpay_order_id, razorpay_payment_id, razorpay_signature } =
        body.into_inner();
    debug!("💻️ Verify payment request for {order_id} with payment {razorpay_payment_id}");
    if !gateway.verify_signature(&razorpay_order_id, &razorpay_payment_id, &razorpay_signature) {
        warn!("💻️ Invalid payment signature for order {order_id}. The request is rejected.");
        return Err(ServerError::InvalidSignature);
    }
    let event = PaymentEvent::captured(
        format!("verify-{razorpay_payment_id}"),
        razorpay_payment_id,
        Some(razorpay_order_id),
    );
    let outcome = api.apply_payment_event(&order_id, event).await?;
    Ok(HttpResponse::Ok().json(OrderResult::new(outcome.order, Utc::now())))
}

route!(process_refund => Post "/refund/{order_id}" impl LifecycleDatabase, PaymentGateway);
/// Process the queued refund for a cancelled order.
///
/// The refund must have been queued by a cancellation. The gateway is asked to return the full amount; its
/// verdict settles the refund as processed or failed. A network failure leaves the refund pending so the
/// call can simply be retried.
pub async fn process_refund<B, G>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<G>,
) -> Result<HttpResponse, ServerError>
where
    B: LifecycleDatabase,
    G: PaymentGateway,
{
    let order_id = OrderId(path.into_inner());
    info!("💻️ Process refund request for {order_id}");
    let order = api
        .db()
        .fetch_order_by_id(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} not found")))?;
    if order.refund.refund_status != RefundStatusType::Pending {
        debug!("💻️ Order {order_id} has no pending refund to process.");
        return Err(OrderFlowError::InvalidRefundState(order.refund.refund_status).into());
    }
    let payment_id = order.payment.payment_id.clone().ok_or_else(|| {
        ServerError::Unspecified(format!("Order {order_id} has a queued refund but no recorded payment id"))
    })?;
    let order = match gateway.refund(&payment_id, order.refund.refund_amount, RefundSpeed::Normal).await {
        Ok(result) => {
            info!("💻️ Gateway accepted refund {} for order {order_id}", result.refund_id);
            api.settle_refund(&order_id, RefundOutcome::Processed, None).await?
        },
        Err(PaymentGatewayError::Rejected(reason)) => {
            warn!("💻️ Gateway rejected refund for order {order_id}. {reason}");
            api.settle_refund(&order_id, RefundOutcome::Failed, Some(reason)).await?
        },
        Err(e @ PaymentGatewayError::NetworkError(_)) => {
            warn!("💻️ Could not reach the gateway to refund order {order_id}. The refund stays queued. {e}");
            return Err(e.into());
        },
    };
    Ok(HttpResponse::Ok().json(OrderResult::new(order, Utc::now())))
}
