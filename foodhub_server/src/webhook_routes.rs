//----------------------------------------------   Webhooks  ----------------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info, trace, warn};
use foodhub_order_engine::{
    db_types::{Order, OrderNumber, PaymentEvent},
    traits::{LifecycleDatabase, OrderFlowError, RefundOutcome},
    OrderFlowApi,
};

use crate::{
    data_objects::{JsonResponse, PaymentEntity, WebhookEvent},
    route,
};

route!(payment_webhook => Post "/payment" impl LifecycleDatabase);
/// The Razorpay payment webhook.
///
/// The HMAC middleware has already verified the signature over the raw body by the time this handler runs,
/// so the event is trusted. Deliveries are retried by the gateway and can arrive more than once and out of
/// order; the engine's event-id and payment-id idempotency absorbs both, so every recognised event is
/// answered with a 200 even when it changes nothing.
pub async fn payment_webhook<B: LifecycleDatabase>(
    req: HttpRequest,
    body: web::Json<WebhookEvent>,
    api: web::Data<OrderFlowApi<B>>,
) -> HttpResponse {
    trace!("💳️ Received webhook request: {}", req.uri());
    let event = body.into_inner();
    let event_id = delivery_id(&req, &event);
    debug!("💳️ Webhook event '{}' with delivery id [{event_id}]", event.event);
    let result = match event.event.as_str() {
        "payment.captured" | "order.paid" => match payment_entity(&event) {
            Some(payment) => {
                let captured = PaymentEvent::captured(event_id, payment.id.clone(), payment.order_id.clone());
                apply_event(&api, &event, captured).await
            },
            None => {
                warn!("💳️ A '{}' event arrived without a payment entity. Nothing to do.", event.event);
                JsonResponse::failure("No payment entity in event payload.")
            },
        },
        "payment.failed" | "order.payment_failed" => match payment_entity(&event) {
            Some(payment) => {
                let failed =
                    PaymentEvent::failed(event_id, Some(payment.id.clone()), payment.error_description.clone());
                apply_event(&api, &event, failed).await
            },
            None => {
                warn!("💳️ A '{}' event arrived without a payment entity. Nothing to do.", event.event);
                JsonResponse::failure("No payment entity in event payload.")
            },
        },
        "refund.processed" => settle_refund_from_webhook(&api, &event).await,
        other => {
            info!("💳️ Ignoring webhook event type '{other}'.");
            JsonResponse::success(format!("Event '{other}' acknowledged but not handled."))
        },
    };
    // Webhook responses must always be in the 200 range, otherwise Razorpay will retry indefinitely
    HttpResponse::Ok().json(result)
}

/// The gateway's delivery id, used as the idempotency key for the event. Falls back to a key derived from
/// the event content when the header is absent (e.g. replays from the dashboard).
fn delivery_id(req: &HttpRequest, event: &WebhookEvent) -> String {
    req.headers()
        .get("x-razorpay-event-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            let payment_id = payment_entity(event).map(|p| p.id.as_str()).unwrap_or("unknown");
            format!("{}:{payment_id}", event.event)
        })
}

fn payment_entity(event: &WebhookEvent) -> Option<&PaymentEntity> {
    event.payload.payment.as_ref().map(|w| &w.entity)
}

/// The order number travels in the notes we attached when registering the intent, or in the order entity's
/// receipt for order-level events.
fn order_number_for(event: &WebhookEvent) -> Option<OrderNumber> {
    payment_entity(event)
        .and_then(|p| p.notes.order_number.clone())
        .or_else(|| event.payload.order.as_ref().and_then(|w| w.entity.receipt.clone()))
        .or_else(|| event.payload.order.as_ref().and_then(|w| w.entity.notes.order_number.clone()))
        .or_else(|| event.payload.refund.as_ref().and_then(|w| w.entity.notes.order_number.clone()))
        .map(OrderNumber)
}

async fn lookup_order<B: LifecycleDatabase>(api: &OrderFlowApi<B>, event: &WebhookEvent) -> Result<Order, JsonResponse> {
    let number = order_number_for(event).ok_or_else(|| {
        warn!("💳️ Webhook event '{}' does not identify an order. Nothing to do.", event.event);
        JsonResponse::failure("Could not determine which order the event belongs to.")
    })?;
    match api.db().fetch_order_by_order_number(&number).await {
        Ok(Some(order)) => Ok(order),
        Ok(None) => {
            warn!("💳️ Webhook event refers to unknown order {}.", number.as_str());
            Err(JsonResponse::failure(format!("No order with number {}", number.as_str())))
        },
        Err(e) => {
            warn!("💳️ Could not look up order {}. {e}", number.as_str());
            Err(JsonResponse::failure("Could not look up the order."))
        },
    }
}

async fn apply_event<B: LifecycleDatabase>(
    api: &OrderFlowApi<B>,
    event: &WebhookEvent,
    payment_event: PaymentEvent,
) -> JsonResponse {
    let order = match lookup_order(api, event).await {
        Ok(order) => order,
        Err(response) => return response,
    };
    match api.apply_payment_event(&order.id, payment_event).await {
        Ok(outcome) if outcome.duplicate => {
            info!("💳️ Webhook event for order {} was a replay.", order.order_number);
            JsonResponse::success("Event already processed.")
        },
        Ok(outcome) => {
            info!(
                "💳️ Webhook event applied to order {}. Payment is now '{}'.",
                order.order_number, outcome.order.payment.payment_status
            );
            JsonResponse::success("Event processed successfully.")
        },
        Err(OrderFlowError::DatabaseError(e)) => {
            warn!("💳️ Could not process webhook event for order {}. {e}", order.order_number);
            JsonResponse::failure(e)
        },
        Err(e) => {
            warn!("💳️ Unexpected error while handling webhook event for order {}. {e}", order.order_number);
            JsonResponse::failure("Unexpected error handling event.")
        },
    }
}

/// A gateway-side refund confirmation. Our refunds settle synchronously when an operator processes them, so
/// a delivery for an already-settled refund is just a replay.
async fn settle_refund_from_webhook<B: LifecycleDatabase>(
    api: &OrderFlowApi<B>,
    event: &WebhookEvent,
) -> JsonResponse {
    let order = match lookup_order(api, event).await {
        Ok(order) => order,
        Err(response) => return response,
    };
    match api.settle_refund(&order.id, RefundOutcome::Processed, None).await {
        Ok(order) => {
            info!("💳️ Refund for order {} settled via webhook.", order.order_number);
            JsonResponse::success("Refund settled.")
        },
        Err(OrderFlowError::InvalidRefundState(_)) => {
            info!("💳️ Refund for order {} was already settled.", order.order_number);
            JsonResponse::success("Refund already settled.")
        },
        Err(e) => {
            warn!("💳️ Could not settle refund for order {}. {e}", order.order_number);
            JsonResponse::failure("Could not settle the refund.")
        },
    }
}
