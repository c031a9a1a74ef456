use chrono::{DateTime, Duration, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        CancelledBy,
        NewOrder,
        Order,
        OrderId,
        OrderLine,
        OrderNumber,
        OrderStatusType,
        PaymentStatusType,
        PriceBreakdown,
        ESTIMATED_DELIVERY_MINUTES,
    },
    order_flow::{OrderQueryFilter, OrderStatistics},
    traits::{OrderFlowError, RefundOutcome},
};

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Insert a new order row and its lines. Not atomic on its own; callers embed this in a transaction alongside
/// the stock reservation. The price breakdown and line snapshots are taken as given; the caller has already
/// resolved them against the catalog.
pub async fn insert_order(
    order: &NewOrder,
    order_number: &OrderNumber,
    lines: &[OrderLine],
    pricing: &PriceBreakdown,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let estimated_delivery_at = Utc::now() + Duration::minutes(ESTIMATED_DELIVERY_MINUTES);
    let mut result: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number, user_id,
                full_name, phone, street, city, state, zip_code, country, delivery_instructions,
                method, upi_id, card_last4, card_brand,
                subtotal, delivery_fee, tax, discount, total,
                status, is_urgent, notes, estimated_delivery_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21,
                $22, $23
            )
            RETURNING *;
        "#,
    )
    .bind(order_number)
    .bind(&order.user_id)
    .bind(&order.delivery.full_name)
    .bind(&order.delivery.phone)
    .bind(&order.delivery.street)
    .bind(&order.delivery.city)
    .bind(&order.delivery.state)
    .bind(&order.delivery.zip_code)
    .bind(&order.delivery.country)
    .bind(&order.delivery.delivery_instructions)
    .bind(order.payment_method.to_string())
    .bind(&order.upi_id)
    .bind(&order.card_last4)
    .bind(&order.card_brand)
    .bind(pricing.subtotal)
    .bind(pricing.delivery_fee)
    .bind(pricing.tax)
    .bind(pricing.discount)
    .bind(pricing.total)
    .bind(status.to_string())
    .bind(order.is_urgent)
    .bind(&order.notes)
    .bind(estimated_delivery_at)
    .fetch_one(&mut *conn)
    .await?;
    for line in lines {
        sqlx::query(
            "INSERT INTO order_lines (order_id, food_id, name, unit_price, quantity, line_total) VALUES ($1, $2, \
             $3, $4, $5, $6)",
        )
        .bind(result.id)
        .bind(&line.food_id)
        .bind(&line.name)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(line.line_total)
        .execute(&mut *conn)
        .await?;
    }
    result.lines = lines.to_vec();
    Ok(result)
}

/// Load the lines for a single order, in insertion order.
pub async fn load_lines(order: &mut Order, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let lines: Vec<OrderLine> = sqlx::query_as(
        "SELECT food_id, name, unit_price, quantity, line_total FROM order_lines WHERE order_id = $1 ORDER BY id",
    )
    .bind(order.id)
    .fetch_all(conn)
    .await?;
    order.lines = lines;
    Ok(())
}

async fn load_lines_for_all(orders: &mut [Order], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for order in orders.iter_mut() {
        load_lines(order, &mut *conn).await?;
    }
    Ok(())
}

pub async fn fetch_order_by_id(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    match order {
        Some(mut order) => {
            load_lines(&mut order, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

pub async fn fetch_order_by_order_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(number).fetch_optional(&mut *conn).await?;
    match order {
        Some(mut order) => {
            load_lines(&mut order, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

/// All orders for a user, newest first.
pub async fn fetch_orders_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut orders: Vec<Order> = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    load_lines_for_all(&mut orders, conn).await?;
    Ok(orders)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_number) = query.order_number {
        where_clause.push("order_number = ");
        where_clause.push_bind_unseparated(order_number);
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(method) = query.payment_method {
        where_clause.push("method = ");
        where_clause.push_bind_unseparated(method.to_string());
    }
    if let Some(payment_status) = query.payment_status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(payment_status.to_string());
    }
    if let Some(urgent) = query.is_urgent {
        where_clause.push("is_urgent = ");
        where_clause.push_bind_unseparated(urgent);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let mut orders = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    load_lines_for_all(&mut orders, conn).await?;
    Ok(orders)
}

pub async fn fetch_orders_by_payment_status(
    status: PaymentStatusType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE payment_status = $1 ORDER BY created_at ASC")
            .bind(status.to_string())
            .fetch_all(&mut *conn)
            .await?;
    load_lines_for_all(&mut orders, conn).await?;
    Ok(orders)
}

/// Orders whose estimated delivery time has passed without reaching a terminal state.
pub async fn fetch_delayed_orders(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut orders: Vec<Order> = sqlx::query_as(
        "SELECT * FROM orders WHERE estimated_delivery_at IS NOT NULL AND estimated_delivery_at < $1 AND status \
         NOT IN ('delivered', 'cancelled') ORDER BY estimated_delivery_at ASC",
    )
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;
    load_lines_for_all(&mut orders, conn).await?;
    Ok(orders)
}

pub async fn order_statistics(conn: &mut SqliteConnection) -> Result<OrderStatistics, sqlx::Error> {
    let stats = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) AS total_orders,
            COALESCE(SUM(status = 'pending'), 0) AS pending_orders,
            COALESCE(SUM(status IN ('confirmed', 'preparing', 'ready', 'out_for_delivery')), 0) AS active_orders,
            COALESCE(SUM(status = 'delivered'), 0) AS delivered_orders,
            COALESCE(SUM(status = 'cancelled'), 0) AS cancelled_orders,
            COALESCE(SUM(CASE WHEN status = 'delivered' THEN total END), 0) AS total_revenue
        FROM orders
        "#,
    )
    .fetch_one(conn)
    .await?;
    Ok(stats)
}

/// Move an order to `new_status`, stamping the timestamp of the state being entered. Transition validity has
/// already been checked by the caller, inside the same transaction.
pub(crate) async fn update_status_with_stamp(
    id: &OrderId,
    new_status: OrderStatusType,
    notes: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderFlowError> {
    let mut builder = QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, status = ");
    builder.push_bind(new_status.to_string());
    match new_status {
        OrderStatusType::Preparing => {
            builder.push(", preparing_at = CURRENT_TIMESTAMP");
        },
        OrderStatusType::OutForDelivery => {
            builder.push(", out_for_delivery_at = CURRENT_TIMESTAMP");
        },
        OrderStatusType::Delivered => {
            builder.push(", actual_delivery_at = CURRENT_TIMESTAMP");
        },
        _ => {},
    }
    if let Some(notes) = notes {
        builder.push(", notes = ");
        builder.push_bind(notes);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id.value());
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let mut order: Order =
        builder.build_query_as().fetch_optional(&mut *conn).await?.ok_or(OrderFlowError::OrderNotFound(*id))?;
    load_lines(&mut order, conn).await?;
    Ok(order)
}

/// Record a completed payment on the order. A pending order is advanced to `confirmed` in the same statement.
pub(crate) async fn mark_payment_completed(
    id: &OrderId,
    payment_id: &str,
    transaction_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderFlowError> {
    let mut order: Order = sqlx::query_as(
        r#"
        UPDATE orders SET
            updated_at = CURRENT_TIMESTAMP,
            payment_status = 'completed',
            payment_id = $1,
            transaction_id = COALESCE($2, transaction_id),
            status = CASE WHEN status = 'pending' THEN 'confirmed' ELSE status END
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(payment_id)
    .bind(transaction_id)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(OrderFlowError::OrderNotFound(*id))?;
    load_lines(&mut order, conn).await?;
    Ok(order)
}

/// Record a failed payment attempt. The order itself stays `pending`; the customer may retry.
pub(crate) async fn mark_payment_failed(id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, OrderFlowError> {
    let mut order: Order = sqlx::query_as(
        "UPDATE orders SET updated_at = CURRENT_TIMESTAMP, payment_status = 'failed' WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(OrderFlowError::OrderNotFound(*id))?;
    load_lines(&mut order, conn).await?;
    Ok(order)
}

/// Mark an order cancelled. When `queue_refund` is set (the payment had completed), the refund sub-state moves
/// to `pending` for the full order total in the same statement; the payment status stays `completed` until the
/// refund is settled.
pub(crate) async fn mark_cancelled(
    id: &OrderId,
    reason: &str,
    cancelled_by: CancelledBy,
    queue_refund: bool,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderFlowError> {
    let mut order: Order = sqlx::query_as(
        r#"
        UPDATE orders SET
            updated_at = CURRENT_TIMESTAMP,
            status = 'cancelled',
            cancelled_at = CURRENT_TIMESTAMP,
            cancellation_reason = $1,
            cancelled_by = $2,
            refund_status = CASE WHEN $3 THEN 'pending' ELSE refund_status END,
            refund_amount = CASE WHEN $3 THEN total ELSE refund_amount END,
            refund_reason = CASE WHEN $3 THEN $1 ELSE refund_reason END
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(reason)
    .bind(cancelled_by.to_string())
    .bind(queue_refund)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(OrderFlowError::OrderNotFound(*id))?;
    load_lines(&mut order, conn).await?;
    Ok(order)
}

/// Settle a pending refund. `Processed` also flips the payment status to `refunded`. The caller has already
/// verified, inside the same transaction, that the refund is currently `pending`.
pub(crate) async fn settle_refund_row(
    id: &OrderId,
    outcome: RefundOutcome,
    reason: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderFlowError> {
    let sql = match outcome {
        RefundOutcome::Processed => {
            "UPDATE orders SET updated_at = CURRENT_TIMESTAMP, refund_status = 'processed', payment_status = \
             'refunded', refund_reason = COALESCE($1, refund_reason) WHERE id = $2 RETURNING *"
        },
        RefundOutcome::Failed => {
            "UPDATE orders SET updated_at = CURRENT_TIMESTAMP, refund_status = 'failed', refund_reason = \
             COALESCE($1, refund_reason) WHERE id = $2 RETURNING *"
        },
    };
    let mut order: Order = sqlx::query_as(sql)
        .bind(reason)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(OrderFlowError::OrderNotFound(*id))?;
    load_lines(&mut order, conn).await?;
    Ok(order)
}

/// Ids of orders that have sat in `pending` without a completed payment for longer than `limit`.
pub(crate) async fn fetch_stale_pending_ids(
    limit: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderId>, sqlx::Error> {
    let ids: Vec<i64> = sqlx::query_scalar(
        format!(
            "SELECT id FROM orders WHERE status = 'pending' AND payment_status <> 'completed' AND \
             (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > {}",
            limit.num_seconds()
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(ids.into_iter().map(OrderId::from).collect())
}
