//! Order repository for database operations.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use cfac_core::{
    Address, CompensationStatus, EmployeeKind, OrderId, OrderStatus, PaymentMethod,
    PaymentStatus, PaymentTiming, UserId, VehicleSize,
};

use super::{Pagination, RepositoryError};
use crate::models::order::{NewOrder, Order, OrderEdit, OrderLine};

const ORDER_COLUMNS: &str = "id, user_id, is_guest, guest_name, guest_email, guest_phone_number, \
     guest_address, vehicle_size, selected_services, services_total, fee, travel_fee, final_price, \
     estimated_minutes, order_date, service_date, payment_timing, payment_status, payment_method, \
     payment_intent_id, address, status, scheduled_by, salesperson_id, tech_compensation_status, \
     salesperson_compensation_status, has_downpayment_collected, downpayment_checkout_url, \
     remaining_balance_checkout_url, service_package, senior_rv_discount, created_at";

/// Payment statuses that still need collecting.
const OUTSTANDING: &str = "payment_status NOT IN ('paid', 'downpaymentcollected') \
     AND status <> 'cancelled'";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    is_guest: bool,
    guest_name: Option<String>,
    guest_email: Option<String>,
    guest_phone_number: Option<String>,
    guest_address: Option<Json<Address>>,
    vehicle_size: Option<String>,
    selected_services: Json<Vec<OrderLine>>,
    services_total: Decimal,
    fee: Decimal,
    travel_fee: Decimal,
    final_price: Option<Decimal>,
    estimated_minutes: i32,
    order_date: DateTime<Utc>,
    service_date: Option<NaiveDateTime>,
    payment_timing: PaymentTiming,
    payment_status: PaymentStatus,
    payment_method: Option<PaymentMethod>,
    payment_intent_id: Option<String>,
    address: Option<Json<Address>>,
    status: OrderStatus,
    scheduled_by: Option<UserId>,
    salesperson_id: Option<UserId>,
    tech_compensation_status: CompensationStatus,
    salesperson_compensation_status: CompensationStatus,
    has_downpayment_collected: bool,
    downpayment_checkout_url: Option<String>,
    remaining_balance_checkout_url: Option<String>,
    service_package: String,
    senior_rv_discount: bool,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            is_guest: r.is_guest,
            guest_name: r.guest_name,
            guest_email: r.guest_email,
            guest_phone_number: r.guest_phone_number,
            guest_address: r.guest_address.map(|Json(a)| a),
            // Field apps have sent free-form sizes; unknown ones are dropped.
            vehicle_size: r.vehicle_size.as_deref().and_then(VehicleSize::normalize),
            lines: r.selected_services.0,
            services_total: r.services_total,
            fee: r.fee,
            travel_fee: r.travel_fee,
            final_price: r.final_price,
            estimated_minutes: r.estimated_minutes,
            order_date: r.order_date,
            service_date: r.service_date,
            payment_timing: r.payment_timing,
            payment_status: r.payment_status,
            payment_method: r.payment_method,
            payment_intent_id: r.payment_intent_id,
            address: r.address.map(|Json(a)| a),
            status: r.status,
            scheduled_by: r.scheduled_by,
            salesperson_id: r.salesperson_id,
            tech_compensation: r.tech_compensation_status,
            salesperson_compensation: r.salesperson_compensation_status,
            has_downpayment_collected: r.has_downpayment_collected,
            downpayment_checkout_url: r.downpayment_checkout_url,
            remaining_balance_checkout_url: r.remaining_balance_checkout_url,
            service_package: r.service_package,
            senior_rv_discount: r.senior_rv_discount,
            created_at: r.created_at,
        }
    }
}

/// Order totals shown on the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderCounts {
    pub total: i64,
    pub guest: i64,
}

impl OrderCounts {
    /// Orders placed through customer checkout.
    #[must_use]
    pub const fn checkout(&self) -> i64 {
        self.total - self.guest
    }

    /// Share of `part` in all orders, in percent with one decimal (0 when empty).
    #[must_use]
    pub fn percent(&self, part: i64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = part as f64 * 100.0 / self.total as f64;
        (pct * 10.0).round() / 10.0
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        tail: &str,
        bind: Option<UserId>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders {tail}");
        let mut query = sqlx::query_as::<_, OrderRow>(&sql);
        if let Some(id) = bind {
            query = query.bind(id);
        }
        let rows = query.fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Insert an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (user_id, is_guest, guest_name, guest_email, guest_phone_number,
                                guest_address, vehicle_size, selected_services, services_total,
                                fee, travel_fee, final_price, estimated_minutes, service_date,
                                payment_timing, payment_status, address, salesperson_id,
                                service_package, senior_rv_discount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(new.user_id)
        .bind(new.is_guest)
        .bind(&new.guest_name)
        .bind(&new.guest_email)
        .bind(&new.guest_phone_number)
        .bind(new.guest_address.as_ref().map(Json))
        .bind(new.vehicle_size)
        .bind(Json(&new.lines))
        .bind(new.services_total)
        .bind(new.fee)
        .bind(new.travel_fee)
        .bind(new.final_price)
        .bind(new.estimated_minutes)
        .bind(new.service_date)
        .bind(new.payment_timing)
        .bind(new.payment_status)
        .bind(new.address.as_ref().map(Json))
        .bind(new.salesperson_id)
        .bind(&new.service_package)
        .bind(new.senior_rv_discount)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get an order by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    /// Delete an order.
    ///
    /// # Returns
    ///
    /// Returns `true` if the order was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One page of all orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_page(&self, page: Pagination) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_many(
            &format!(
                "ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
                page.per_page,
                page.offset()
            ),
            None,
        )
        .await
    }

    /// Total and guest order counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn counts(&self) -> Result<OrderCounts, RepositoryError> {
        let counts = sqlx::query_as::<_, OrderCounts>(
            "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE is_guest) AS guest FROM orders",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }

    /// Orders a customer placed, plus guest orders matching their email or phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        user_id: UserId,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE user_id = $1
               OR (is_guest AND $2::TEXT IS NOT NULL AND LOWER(guest_email) = LOWER($2))
               OR (is_guest AND $3::TEXT IS NOT NULL AND $3 <> '' AND guest_phone_number = $3)
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .bind(email)
        .bind(phone)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// One page of a user's own orders, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Order::from).collect(), total))
    }

    /// Orders waiting for a technician, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_available(&self) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_many(
            "WHERE status = 'ordered' ORDER BY created_at DESC, id DESC",
            None,
        )
        .await
    }

    /// Jobs a technician has scheduled and not yet completed, soonest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_scheduled_by(&self, tech: UserId) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_many(
            "WHERE status = 'scheduled' AND scheduled_by = $1 \
             ORDER BY service_date ASC NULLS LAST, id",
            Some(tech),
        )
        .await
    }

    /// Claim an order for a technician.
    ///
    /// Only succeeds while the order is still `ordered`, so two technicians
    /// can't both schedule the same job.
    ///
    /// # Returns
    ///
    /// The updated order, or `None` if it doesn't exist or isn't `ordered`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn schedule(
        &self,
        id: OrderId,
        tech: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = 'scheduled', scheduled_by = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'ordered'
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(tech)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    /// Mark a scheduled job completed by the technician who scheduled it.
    ///
    /// # Returns
    ///
    /// The updated order, or `None` if it isn't a `scheduled` job of `tech`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn complete(
        &self,
        id: OrderId,
        tech: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status = 'scheduled' AND scheduled_by = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(tech)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    /// Apply an admin edit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn admin_update(&self, id: OrderId, edit: &OrderEdit) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = $2, payment_method = $3, final_price = $4, service_date = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(edit.status)
        .bind(edit.payment_method)
        .bind(edit.final_price)
        .bind(edit.service_date)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Record the outcome of a payment attempt.
    ///
    /// `intent_id` is kept when `None`. `downpaymentcollected` also sets the
    /// down-payment flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn set_payment(
        &self,
        id: OrderId,
        method: Option<PaymentMethod>,
        status: PaymentStatus,
        intent_id: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET payment_method = COALESCE($2, payment_method),
                payment_status = $3,
                payment_intent_id = COALESCE($4, payment_intent_id),
                has_downpayment_collected = has_downpayment_collected OR $3 = 'downpaymentcollected',
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(method)
        .bind(status)
        .bind(intent_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Update every order carrying a payment intent, as reported by a webhook.
    ///
    /// Returns the IDs of the updated orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_payment_status_by_intent(
        &self,
        intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Vec<OrderId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, OrderId>(
            r"
            UPDATE orders SET payment_status = $2, updated_at = NOW()
            WHERE payment_intent_id = $1
            RETURNING id
            ",
        )
        .bind(intent_id)
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Mark a technician's or salesperson's pay for an order as settled.
    ///
    /// # Returns
    ///
    /// Returns `true` if the order exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_compensation_paid(
        &self,
        id: OrderId,
        kind: EmployeeKind,
    ) -> Result<bool, RepositoryError> {
        let sql = match kind {
            EmployeeKind::Tech => {
                "UPDATE orders SET tech_compensation_status = 'paid', updated_at = NOW() WHERE id = $1"
            }
            EmployeeKind::Salesperson => {
                "UPDATE orders SET salesperson_compensation_status = 'paid', updated_at = NOW() \
                 WHERE id = $1"
            }
        };
        let result = sqlx::query(sql).bind(id).execute(self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// One page of orders by service date, latest first, for the compensation report.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_service_date(
        &self,
        page: Pagination,
    ) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_many(
            &format!(
                "ORDER BY service_date DESC NULLS LAST, id DESC LIMIT {} OFFSET {}",
                page.per_page,
                page.offset()
            ),
            None,
        )
        .await
    }

    /// Orders with payment still to collect, optionally only a salesperson's.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_unpaid(
        &self,
        salesperson: Option<UserId>,
    ) -> Result<Vec<Order>, RepositoryError> {
        match salesperson {
            Some(id) => {
                self.fetch_many(
                    &format!(
                        "WHERE {OUTSTANDING} AND salesperson_id = $1 ORDER BY created_at DESC, id DESC"
                    ),
                    Some(id),
                )
                .await
            }
            None => {
                self.fetch_many(
                    &format!("WHERE {OUTSTANDING} ORDER BY created_at DESC, id DESC"),
                    None,
                )
                .await
            }
        }
    }

    /// Orders where a down payment was taken in the field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_downpayment(&self) -> Result<Vec<Order>, RepositoryError> {
        self.fetch_many(
            "WHERE has_downpayment_collected ORDER BY created_at DESC, id DESC",
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_counts_percentages() {
        let counts = OrderCounts { total: 3, guest: 1 };
        assert_eq!(counts.checkout(), 2);
        assert!((counts.percent(counts.guest) - 33.3).abs() < f64::EPSILON);
        assert!((counts.percent(counts.checkout()) - 66.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_order_counts_empty_is_zero_percent() {
        let counts = OrderCounts::default();
        assert!(counts.percent(counts.guest).abs() < f64::EPSILON);
    }
}
