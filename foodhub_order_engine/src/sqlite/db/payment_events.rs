use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{OrderId, PaymentEvent, PaymentEventKind};

/// Try to claim a payment event for processing.
///
/// The insert is `OR IGNORE` against the unique `event_id` column, so exactly one of two concurrent deliveries of
/// the same event gets `true` back; the other sees `false` and must treat the event as already processed.
pub async fn claim_event(
    event: &PaymentEvent,
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let (kind, payment_id) = match &event.kind {
        PaymentEventKind::Captured { payment_id, .. } => ("captured", Some(payment_id.as_str())),
        PaymentEventKind::Failed { payment_id, .. } => ("failed", payment_id.as_deref()),
        PaymentEventKind::CashCollected => ("cash_collected", None),
    };
    let result =
        sqlx::query("INSERT OR IGNORE INTO payment_events (event_id, order_id, payment_id, kind) VALUES ($1, $2, $3, $4)")
            .bind(&event.event_id)
            .bind(order_id)
            .bind(payment_id)
            .bind(kind)
            .execute(conn)
            .await?;
    let claimed = result.rows_affected() > 0;
    trace!("🗃️ Payment event [{}] claim for order {order_id}: {claimed}", event.event_id);
    Ok(claimed)
}
