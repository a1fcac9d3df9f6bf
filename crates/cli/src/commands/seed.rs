//! Seed the backend database with product listings from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Deshi Potato
//!     category: vegetables
//!     unit: kg
//!     pricePerUnit: "22.50"
//!     quantityAvailable: 800
//!     sellerNumber: "01712345678"
//!     sellerName: Karim Uddin
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use taja_haat_backend::config::BackendConfig;
use taja_haat_backend::db::{self, ProductRepository};
use taja_haat_core::NewProduct;

/// Contents of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<NewProduct>,
}

/// Result of a seeding run.
#[derive(Debug, Default)]
pub struct SeedResult {
    pub removed: u64,
    pub inserted: usize,
    pub errors: Vec<(String, String)>,
}

/// Problems that make a seed file unusable.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    for (index, product) in seed.products.iter().enumerate() {
        let label = format!("product {} ({})", index + 1, product.name);
        if product.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        if product.unit.trim().is_empty() {
            errors.push(format!("{label}: unit is empty"));
        }
        if !product.price_per_unit.is_positive() {
            errors.push(format!("{label}: price must be greater than zero"));
        }
    }
    errors
}

/// Parse and validate a seed file without touching the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML, or fails
/// validation.
pub fn load(path: &Path) -> Result<SeedFile, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }

    let content = std::fs::read_to_string(path)?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    Ok(seed)
}

/// Insert the products in `file_path`, optionally removing unordered
/// listings first.
///
/// # Errors
///
/// Returns an error if the file is unusable or the database cannot be
/// opened.
pub async fn products(
    file_path: &Path,
    clear_existing: bool,
) -> Result<SeedResult, Box<dyn std::error::Error>> {
    let seed = load(file_path)?;

    let config = BackendConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to database");

    let repo = ProductRepository::new(&pool);
    let mut result = SeedResult::default();

    if clear_existing {
        result.removed = repo.delete_unordered().await?;
        info!(removed = result.removed, "Removed listings without orders");
    }

    for product in &seed.products {
        match repo.create(product).await {
            Ok(created) => {
                info!(id = %created.id, name = %created.name, "Inserted product");
                result.inserted += 1;
            }
            Err(e) => result.errors.push((product.name.clone(), e.to_string())),
        }
    }

    info!("Seeding complete!");
    info!("  Products inserted: {}", result.inserted);
    if !result.errors.is_empty() {
        error!("  Errors: {}", result.errors.len());
        for (name, err) in &result.errors {
            error!("    - {name}: {err}");
        }
    }

    Ok(result)
}
