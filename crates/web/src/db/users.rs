//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use cfac_core::{Address, Email, PhoneNumber, Role, UserId};

use super::{Pagination, RepositoryError};
use crate::models::user::{NewUser, ProfileUpdate, User};

const SELECT_USER: &str = "SELECT id, email, username, phone_number, role, name, \
     street_address, unit_apt, city, country, zip_code, sms_opt_in, created_at FROM users";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: Option<String>,
    username: Option<String>,
    phone_number: Option<PhoneNumber>,
    role: Role,
    name: String,
    street_address: String,
    unit_apt: String,
    city: String,
    country: String,
    zip_code: String,
    sms_opt_in: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = r
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))?;

        Ok(Self {
            id: r.id,
            email,
            username: r.username,
            phone_number: r.phone_number,
            role: r.role,
            name: r.name,
            address: Address {
                street: r.street_address,
                unit_apt: r.unit_apt,
                city: r.city,
                country: r.country,
                zip_code: r.zip_code,
            },
            sms_opt_in: r.sms_opt_in,
            created_at: r.created_at,
        })
    }
}

/// Sort column for the user management list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserSort {
    #[default]
    CreatedAt,
    Email,
}

impl UserSort {
    /// Parse the `sort_by` query value (`creation_date` or `email`).
    #[must_use]
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("email") => Self::Email,
            _ => Self::CreatedAt,
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Email => "email",
        }
    }
}

/// Filters for the user management list.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Case-insensitive email substring, or an exact numeric id.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub sort: UserSort,
    pub descending: bool,
}

impl UserQuery {
    fn push_filters(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!(
                "%{}%",
                search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
            );
            qb.push(" AND (email ILIKE ").push_bind(pattern);
            if let Ok(id) = search.parse::<i32>() {
                qb.push(" OR id = ").push_bind(id);
            }
            qb.push(")");
        }
        if let Some(role) = self.role {
            qb.push(" AND role = ").push_bind(role);
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE email = $1"))
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    /// Get a user by their phone number digits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_phone(&self, digits: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE phone_number = $1"))
            .bind(digits)
            .fetch_optional(self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    /// Get an employee by username or email, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_login(&self, login: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE LOWER(username) = LOWER($1) OR email = LOWER($1) \
             ORDER BY (LOWER(username) = LOWER($1)) DESC NULLS LAST LIMIT 1"
        ))
        .bind(login.trim())
        .fetch_optional(self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    /// Get the stored password hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(hash)
    }

    /// Whether another account already uses this email or phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contact_taken(
        &self,
        email: Option<&Email>,
        phone: Option<&PhoneNumber>,
        except: Option<UserId>,
    ) -> Result<bool, RepositoryError> {
        let taken = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE (email = $1 OR phone_number = $2)
                  AND ($3::INTEGER IS NULL OR id <> $3)
            )
            ",
        )
        .bind(email.map(Email::as_str))
        .bind(phone.map(PhoneNumber::as_str))
        .bind(except)
        .fetch_one(self.pool)
        .await?;
        Ok(taken)
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email, username, or phone is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser, password_hash: &str) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (email, username, phone_number, password_hash, role, name,
                               street_address, unit_apt, city, country, zip_code, sms_opt_in)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, email, username, phone_number, role, name,
                      street_address, unit_apt, city, country, zip_code, sms_opt_in, created_at
            ",
        )
        .bind(new.email.as_ref().map(Email::as_str))
        .bind(new.username.as_deref().map(str::to_lowercase))
        .bind(new.phone_number.as_ref())
        .bind(password_hash)
        .bind(new.role)
        .bind(&new.name)
        .bind(&new.address.street)
        .bind(&new.address.unit_apt)
        .bind(&new.address.city)
        .bind(&new.address.country)
        .bind(&new.address.zip_code)
        .bind(new.sms_opt_in)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "user"))?;

        User::try_from(row)
    }

    /// Update a user's profile fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Conflict` if the email or phone is taken.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE users
            SET name = $2, email = $3, phone_number = $4, street_address = $5, unit_apt = $6,
                city = $7, country = $8, zip_code = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, username, phone_number, role, name,
                      street_address, unit_apt, city, country, zip_code, sms_opt_in, created_at
            ",
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.email.as_ref().map(Email::as_str))
        .bind(update.phone_number.as_ref())
        .bind(&update.address.street)
        .bind(&update.address.unit_apt)
        .bind(&update.address.city)
        .bind(&update.address.country)
        .bind(&update.address.zip_code)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "email or phone number"))?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a user. Their orders keep a `NULL` user reference.
    ///
    /// # Returns
    ///
    /// Returns `true` if the user was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List users matching `query`, one page at a time.
    ///
    /// Returns the page and the total number of matching users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        query: &UserQuery,
        page: Pagination,
    ) -> Result<(Vec<User>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        query.push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_USER);
        query.push_filters(&mut select);
        select
            .push(" ORDER BY ")
            .push(query.sort.column())
            .push(if query.descending { " DESC NULLS LAST" } else { " ASC NULLS LAST" })
            .push(", id LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<UserRow> = select.build_query_as().fetch_all(self.pool).await?;
        let users = rows.into_iter().map(User::try_from).collect::<Result<_, _>>()?;
        Ok((users, total))
    }

    /// All users with a role, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE role = $1 ORDER BY name, id"
        ))
        .bind(role)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// Load several users at once, e.g. the employees referenced by a page of orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(UserId::as_i32).collect();
        let rows = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// Number of users per role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_role(&self) -> Result<Vec<(Role, i64)>, RepositoryError> {
        let counts = sqlx::query_as::<_, (Role, i64)>(
            "SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(query: &UserQuery) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        query.push_filters(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn test_user_sort_from_param() {
        assert_eq!(UserSort::from_param(Some("email")), UserSort::Email);
        assert_eq!(UserSort::from_param(Some("creation_date")), UserSort::CreatedAt);
        assert_eq!(UserSort::from_param(Some("password_hash")), UserSort::CreatedAt);
    }

    #[test]
    fn test_filters_without_search() {
        assert_eq!(sql(&UserQuery::default()), "SELECT COUNT(*) FROM users WHERE TRUE");
    }

    #[test]
    fn test_filters_numeric_search_matches_id_too() {
        let query = UserQuery {
            search: Some("42".to_string()),
            role: Some(Role::Tech),
            ..UserQuery::default()
        };
        assert_eq!(
            sql(&query),
            "SELECT COUNT(*) FROM users WHERE TRUE AND (email ILIKE $1 OR id = $2) AND role = $3"
        );
    }

    #[test]
    fn test_filters_text_search() {
        let query = UserQuery {
            search: Some("gmail".to_string()),
            ..UserQuery::default()
        };
        assert_eq!(
            sql(&query),
            "SELECT COUNT(*) FROM users WHERE TRUE AND (email ILIKE $1)"
        );
    }
}
