//! Service catalogue seeding.
//!
//! Reads a YAML list of services and upserts each one by its key, so the
//! command can be re-run after editing prices. A running server picks up
//! the changes when its catalogue cache expires.

use std::path::Path;

use cfac_web::db::{RepositoryError, ServiceRepository};
use cfac_web::models::service::NewService;
use tracing::{error, info};

use super::{CommandError, connect};

/// The four "Complete Detailing" services.
const DEFAULT_SERVICES: &str = include_str!("../../services.yaml");

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid service file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn parse_services(content: &str) -> Result<Vec<NewService>, SeedError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Problems that would make a service unbookable.
fn validate_services(services: &[NewService]) -> Vec<String> {
    let mut errors = Vec::new();
    for service in services {
        if service.label.trim().is_empty() {
            errors.push("service with an empty label".to_string());
        }
        if service.price_by_vehicle_size.is_empty() {
            errors.push(format!("{}: no vehicle sizes priced", service.label));
        }
        for (size, price) in &service.price_by_vehicle_size {
            if price.price.is_sign_negative() {
                errors.push(format!("{}: negative price for {size}", service.label));
            }
        }
    }
    errors
}

/// Seed the catalogue from `file`, or from the built-in list.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a service is
/// invalid, or a database operation fails.
pub async fn services(file: Option<&str>) -> Result<(), SeedError> {
    let content = match file {
        Some(file_path) => {
            let path = Path::new(file_path);
            if !path.exists() {
                return Err(SeedError::FileNotFound(file_path.to_string()));
            }
            info!(path = %file_path, "Loading services from file");
            tokio::fs::read_to_string(path).await?
        }
        None => {
            info!("Loading built-in services");
            DEFAULT_SERVICES.to_string()
        }
    };

    let services = parse_services(&content)?;
    let errors = validate_services(&services);
    if !errors.is_empty() {
        error!("Service validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    let pool = connect().await?;
    let repo = ServiceRepository::new(&pool);
    for new in &services {
        let service = repo.upsert(new).await?;
        info!(key = %service.key, sizes = service.price_by_vehicle_size.len(), "Upserted service");
    }

    info!("Seeding complete! {} services", services.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cfac_core::VehicleSize;
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_builtin_services_parse() {
        let services = parse_services(DEFAULT_SERVICES).unwrap();
        assert_eq!(services.len(), 4);
        assert!(services.iter().all(|s| s.label.ends_with("Complete Detailing")));
        assert!(validate_services(&services).is_empty());

        let sedan = &services[0];
        assert_eq!(sedan.category, "Detailing Services");
        assert!(sedan.active);
        let price = &sedan.price_by_vehicle_size[&VehicleSize::Sedan4Door];
        assert_eq!(price.price, Decimal::new(130, 0));
    }

    #[test]
    fn test_unknown_vehicle_size_rejected() {
        let yaml = "- label: Boat Detailing\n  price_by_vehicle_size:\n    yacht: { price: 10 }\n";
        assert!(matches!(parse_services(yaml), Err(SeedError::Yaml(_))));
    }

    #[test]
    fn test_validation_reports_problems() {
        let yaml = "- label: Wash\n  price_by_vehicle_size: {}\n- label: Wax\n  price_by_vehicle_size:\n    coupe_2_seater: { price: -5 }\n";
        let services = parse_services(yaml).unwrap();
        assert_eq!(validate_services(&services).len(), 2);
    }
}
