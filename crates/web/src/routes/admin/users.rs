//! User management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use cfac_core::{Role, UserId};

use crate::db::users::{UserQuery, UserSort};
use crate::db::{OrderRepository, Pagination, UserRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{Page, RequireAdmin, flash_redirect};
use crate::models::session::FlashLevel;
use crate::models::{Order, User};
use crate::state::AppState;

const MANAGE_USERS: &str = "/admin/manage_users";

#[derive(Debug, Default, Deserialize)]
pub struct ManageUsersQuery {
    pub search: Option<String>,
    pub user_type: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
}

impl ManageUsersQuery {
    fn to_user_query(&self) -> UserQuery {
        UserQuery {
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            role: self.user_type.as_deref().and_then(|t| t.parse::<Role>().ok()),
            sort: UserSort::from_param(self.sort_by.as_deref()),
            descending: self.sort_order.as_deref() != Some("asc"),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/manage_users.html")]
pub struct ManageUsersTemplate {
    pub page: Page,
    pub users: Vec<User>,
    pub roles: &'static [Role],
    pub search: String,
    pub user_type: String,
    pub sort_by: String,
    pub sort_order: String,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_users: i64,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/view_user.html")]
pub struct ViewUserTemplate {
    pub page: Page,
    pub user: User,
    pub orders: Vec<Order>,
    pub total_orders: i64,
}

pub async fn manage_users(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ManageUsersQuery>,
) -> Result<impl IntoResponse> {
    let pagination = Pagination::new(query.page, None);
    let filter = query.to_user_query();
    let (users, total) = UserRepository::new(state.pool()).list(&filter, pagination).await?;

    Ok(ManageUsersTemplate {
        page,
        users,
        roles: Role::ALL,
        search: query.search.unwrap_or_default(),
        user_type: filter.role.map(|r| r.as_str().to_string()).unwrap_or_default(),
        sort_by: match filter.sort {
            UserSort::Email => "email",
            UserSort::CreatedAt => "creation_date",
        }
        .to_string(),
        sort_order: if filter.descending { "desc" } else { "asc" }.to_string(),
        current_page: pagination.page,
        total_pages: pagination.total_pages(total),
        total_users: total,
    })
}

pub async fn view_user(
    State(state): State<AppState>,
    page: Page,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
    let (orders, total_orders) = OrderRepository::new(state.pool())
        .list_for_user(id, Pagination::new(None, None))
        .await?;

    Ok(ViewUserTemplate {
        page,
        user,
        orders,
        total_orders,
    })
}

pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Response> {
    if id == admin.id {
        return Ok(flash_redirect(
            &session,
            FlashLevel::Danger,
            "You cannot delete your own account.",
            MANAGE_USERS,
        )
        .await);
    }

    let (level, message) = if UserRepository::new(state.pool()).delete(id).await? {
        tracing::info!(user_id = %id, admin_id = %admin.id, "User deleted");
        (FlashLevel::Success, "User deleted successfully.")
    } else {
        (FlashLevel::Danger, "User not found.")
    };
    Ok(flash_redirect(&session, level, message, MANAGE_USERS).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_to_newest_first() {
        let query = ManageUsersQuery::default().to_user_query();
        assert_eq!(query.sort, UserSort::CreatedAt);
        assert!(query.descending);
        assert!(query.role.is_none());
        assert!(query.search.is_none());
    }

    #[test]
    fn test_query_parses_filters() {
        let query = ManageUsersQuery {
            search: Some("  ".to_string()),
            user_type: Some("tech".to_string()),
            sort_by: Some("email".to_string()),
            sort_order: Some("asc".to_string()),
            page: Some(2),
        }
        .to_user_query();
        assert_eq!(query.role, Some(Role::Tech));
        assert_eq!(query.sort, UserSort::Email);
        assert!(!query.descending);
        assert!(query.search.is_none());

        let unknown_role = ManageUsersQuery {
            user_type: Some("manager".to_string()),
            ..ManageUsersQuery::default()
        }
        .to_user_query();
        assert!(unknown_role.role.is_none());
    }
}
