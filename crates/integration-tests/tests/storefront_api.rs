//! End-to-end tests: the client crate against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`dp-cli migrate`)
//! - The storefront running (`cargo run -p desh-perfume-storefront`)
//! - For the cart tests, a seeded catalog (`dp-cli seed products --file ...`)

use desh_perfume_client::{ApiError, ClientError, ShippingPolicy};
use desh_perfume_core::{AddressPatch, NewAddress, Role};
use desh_perfume_integration_tests::{PASSWORD, server_root, shop, signup_request, unique_email};
use reqwest::StatusCode;

fn dhaka_address() -> NewAddress {
    NewAddress {
        country: "Bangladesh".to_owned(),
        state: "Dhaka".to_owned(),
        city: "Gazipur".to_owned(),
        zip_code: "1700".to_owned(),
        phone_number: "01711000000".to_owned(),
    }
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_endpoints() {
    let client = reqwest::Client::new();
    for path in ["/health", "/health/ready"] {
        let resp = client
            .get(format!("{}{path}", server_root()))
            .send()
            .await
            .expect("Failed to reach storefront");
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
        assert!(resp.headers().contains_key("x-request-id"));
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_signup_then_login() {
    let email = unique_email();

    let mut shop = shop();
    let user = shop
        .signup(&signup_request(&email))
        .await
        .expect("Signup failed");
    assert_eq!(user.email.as_str(), email);
    assert_eq!(user.role, Role::User);
    assert!(shop.session().is_authenticated());

    shop.logout().expect("Logout failed");
    assert!(!shop.session().is_authenticated());

    let user = shop.login(&email, PASSWORD).await.expect("Login failed");
    assert_eq!(user.email.as_str(), email);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_duplicate_signup_is_rejected() {
    let email = unique_email();
    shop()
        .signup(&signup_request(&email))
        .await
        .expect("Signup failed");

    let err = shop().signup(&signup_request(&email)).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Api(ApiError::Rejected { status: 400, ref message }) if message == "User already exists"
    ));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_weak_signup_reports_fields() {
    let mut request = signup_request(&unique_email());
    request.password = "weak".to_owned();
    request.confirm_password = "different".to_owned();

    let err = shop().signup(&request).await.unwrap_err();
    let ClientError::Api(ApiError::Validation(errors)) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(errors.contains_key("password"));
    assert!(errors.contains_key("confirmPassword"));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_wrong_password() {
    let email = unique_email();
    shop()
        .signup(&signup_request(&email))
        .await
        .expect("Signup failed");

    let err = shop().login(&email, "Wrong#Pass1").await.unwrap_err();
    assert!(matches!(err, ClientError::Api(ApiError::Rejected { status: 400, .. })));
}

// ============================================================================
// Addresses
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_address_lifecycle() {
    let mut shop = shop();
    shop.signup(&signup_request(&unique_email()))
        .await
        .expect("Signup failed");

    assert!(shop.load_address().await.expect("Load failed").is_none());

    let saved = shop
        .save_address(dhaka_address())
        .await
        .expect("Save failed");
    let policy = ShippingPolicy::default();
    assert!(policy.ships_free(&saved));

    let updated = shop
        .update_address(AddressPatch {
            state: Some("Chattogram".to_owned()),
            city: Some("Cox's Bazar".to_owned()),
            ..AddressPatch::default()
        })
        .await
        .expect("Update failed");
    assert_eq!(updated.id, saved.id);
    assert!(!policy.ships_free(&updated));

    shop.delete_address().await.expect("Delete failed");
    assert!(shop.address().is_none());
    assert!(shop.load_address().await.expect("Load failed").is_none());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_address_requires_token() {
    let resp = reqwest::Client::new()
        .get(format!("{}/api/address/get", server_root()))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.expect("Body is not JSON");
    assert!(body["message"].is_string());
}

// ============================================================================
// Catalog and cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server with a seeded catalog"]
async fn test_add_in_stock_size_and_summarize() {
    let mut shop = shop();
    let snapshot = shop.refresh_inventory().await.expect("Catalog fetch failed");

    let Some((product_id, size)) = snapshot.products().iter().find_map(|p| {
        p.sizes
            .iter()
            .find(|s| s.quantity > 0)
            .map(|s| (p.id, s.size.clone()))
    }) else {
        panic!("seed the catalog with at least one in-stock size");
    };

    assert_eq!(shop.add_to_cart(product_id, &size).await.expect("Add failed"), 1);

    let summary = shop.checkout_summary().await.expect("Summary failed");
    assert_eq!(summary.item_count(), 1);
    assert_eq!(summary.total, summary.subtotal + summary.shipping);
}

#[tokio::test]
#[ignore = "Requires running storefront server with a seeded catalog"]
async fn test_categories_and_sizes_are_sorted() {
    let shop = shop();
    let categories = shop.categories().await.expect("Categories failed");
    let sizes = shop.sizes().await.expect("Sizes failed");

    assert!(categories.windows(2).all(|w| w[0] <= w[1]));
    assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
#[ignore = "Requires running storefront server with a seeded catalog"]
async fn test_rating_updates_average() {
    let mut shop = shop();
    shop.signup(&signup_request(&unique_email()))
        .await
        .expect("Signup failed");
    let snapshot = shop.refresh_inventory().await.expect("Catalog fetch failed");
    let product = snapshot.products().first().expect("seed the catalog").clone();

    let rated = shop.rate(product.id, 5).await.expect("Rating failed");
    assert!(rated.ratings.iter().any(|r| r.value.get() == 5));

    // A second rating from the same user replaces the first
    let rerated = shop.rate(product.id, 1).await.expect("Rating failed");
    assert_eq!(rerated.ratings.len(), rated.ratings.len());
}
