//! Staff account creation.
//!
//! ```bash
//! cfac-cli add-employee -e tech@example.com -u jsmith -n "Jo Smith" -r tech
//! ```

use std::io::{BufRead, Write};

use cfac_core::{Address, Email, Role};
use cfac_web::db::{RepositoryError, UserRepository};
use cfac_web::models::user::NewUser;
use cfac_web::services::auth::{AuthError, hash_password, validate_password};

use super::{CommandError, connect};

/// Staff passwords are longer than the customer minimum.
const EMPLOYEE_MIN_PASSWORD: usize = 8;

/// Errors that can occur while creating a staff account.
#[derive(Debug, thiserror::Error)]
pub enum EmployeeError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid role: {0}. Valid roles: admin, tech, sales")]
    InvalidRole(String),

    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("{0}")]
    Password(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("An account with email '{0}' already exists")]
    UserExists(String),

    #[error("Failed to read password: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Arguments for `add-employee`.
#[derive(Debug)]
pub struct EmployeeRequest {
    pub email: String,
    pub username: String,
    pub name: String,
    pub role: String,
    pub password: Option<String>,
}

/// A request whose fields have been checked.
#[derive(Debug)]
struct ValidEmployee {
    email: Email,
    username: String,
    name: String,
    role: Role,
}

fn validate(request: &EmployeeRequest) -> Result<ValidEmployee, EmployeeError> {
    let email = Email::parse(&request.email)
        .map_err(|_| EmployeeError::InvalidEmail(request.email.clone()))?;

    let role: Role = request
        .role
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|_| EmployeeError::InvalidRole(request.role.clone()))?;
    if role == Role::Customer {
        return Err(EmployeeError::InvalidRole(request.role.clone()));
    }

    let username = request.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(EmployeeError::EmptyUsername);
    }

    Ok(ValidEmployee {
        email,
        username,
        name: request.name.trim().to_string(),
        role,
    })
}

fn check_password(password: &str, confirmation: &str) -> Result<(), EmployeeError> {
    if password.is_empty() {
        return Err(EmployeeError::Password("Password cannot be empty".to_string()));
    }
    if password != confirmation {
        return Err(EmployeeError::PasswordMismatch);
    }
    validate_password(password, EMPLOYEE_MIN_PASSWORD).map_err(|e| match e {
        AuthError::WeakPassword(message) => EmployeeError::Password(message),
        other => EmployeeError::Auth(other),
    })
}

#[allow(clippy::print_stderr)]
fn prompt(label: &str) -> Result<String, EmployeeError> {
    eprint!("{label}: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Create a staff account.
///
/// # Errors
///
/// Returns an error if validation fails, the email is taken, or the
/// database is unreachable.
pub async fn add(request: EmployeeRequest) -> Result<(), EmployeeError> {
    let employee = validate(&request)?;

    let password = match request.password {
        Some(password) => {
            check_password(&password, &password)?;
            password
        }
        None => {
            let password = prompt("Enter new employee's password")?;
            let confirmation = prompt("Confirm password")?;
            check_password(&password, &confirmation)?;
            password
        }
    };

    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    if users.get_by_email(&employee.email).await?.is_some() {
        return Err(EmployeeError::UserExists(employee.email.to_string()));
    }

    let new = NewUser {
        email: Some(employee.email),
        username: Some(employee.username),
        phone_number: None,
        role: employee.role,
        name: employee.name,
        address: Address::default(),
        sms_opt_in: false,
    };
    let user = match users.create(&new, &hash_password(&password)?).await {
        Ok(user) => user,
        Err(RepositoryError::Conflict(_)) => {
            return Err(EmployeeError::UserExists(request.email));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %user.id, role = %user.role, "Employee '{}' added", user.display_name());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(email: &str, role: &str) -> EmployeeRequest {
        EmployeeRequest {
            email: email.to_string(),
            username: " JSmith ".to_string(),
            name: "Jo Smith".to_string(),
            role: role.to_string(),
            password: None,
        }
    }

    #[test]
    fn test_validate_accepts_staff_roles() {
        for role in ["admin", "tech", "Sales"] {
            let employee = validate(&request("jo@example.com", role)).unwrap();
            assert_eq!(employee.username, "jsmith");
        }
    }

    #[test]
    fn test_validate_rejects_customer_and_unknown_roles() {
        assert!(matches!(
            validate(&request("jo@example.com", "customer")),
            Err(EmployeeError::InvalidRole(_))
        ));
        assert!(matches!(
            validate(&request("jo@example.com", "employee")),
            Err(EmployeeError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        assert!(matches!(
            validate(&request("not-an-email", "tech")),
            Err(EmployeeError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_password_rules() {
        assert!(check_password("longenough", "longenough").is_ok());
        assert!(matches!(
            check_password("longenough", "different1"),
            Err(EmployeeError::PasswordMismatch)
        ));
        assert!(matches!(check_password("short", "short"), Err(EmployeeError::Password(_))));
        assert!(matches!(check_password("", ""), Err(EmployeeError::Password(_))));
    }
}
