//! Seed the Postgres catalog with the built-in sample products.
//!
//! Rows keep their sample ids (`"1"` to `"20"`), so the storefront's
//! offline fallback and a seeded database agree. Existing ids are left
//! untouched, which makes the command safe to re-run.

use emporium_core::Product;
use emporium_core::catalog::mock_products;
use sqlx::PgPool;
use sqlx::types::Json;

use emporium_api::db::create_pool;

use super::{CommandError, database_url};

const INSERT_PRODUCT: &str = "INSERT INTO products \
     (id, title, price, description, category, image, rating_rate, rating_count, \
      specifications, is_featured) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
     ON CONFLICT (id) DO NOTHING";

/// Insert the sample catalog.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or an insert fails.
pub async fn catalog() -> Result<(), CommandError> {
    let database_url = database_url()?;
    let pool = create_pool(&database_url).await?;
    tracing::info!("Connected to database");

    let products = mock_products();
    let total = products.len();
    let inserted = insert_products(&pool, products).await?;

    tracing::info!("Seeding complete!");
    tracing::info!("  Products inserted: {inserted}");
    tracing::info!("  Products skipped (already exist): {}", total - inserted);
    Ok(())
}

/// Insert `products` in one transaction and return how many were new.
async fn insert_products(pool: &PgPool, products: Vec<Product>) -> Result<usize, CommandError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for product in products {
        let rating_count = i32::try_from(product.rating.count)
            .map_err(|_| CommandError::Seed(format!("rating count out of range for {}", product.id)))?;
        let result = sqlx::query(INSERT_PRODUCT)
            .bind(product.id.as_str())
            .bind(&product.title)
            .bind(product.price)
            .bind(&product.description)
            .bind(&product.category)
            .bind(&product.image)
            .bind(product.rating.rate)
            .bind(rating_count)
            .bind(product.specifications.map(Json))
            .bind(product.is_featured)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 1 {
            inserted += 1;
        } else {
            tracing::debug!(product_id = %product.id, "Product already present");
        }
    }

    tx.commit().await?;
    Ok(inserted)
}
