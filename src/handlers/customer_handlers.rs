//! Customer CRUD over the `Customers` table.

use crate::{
    errors::AppError, models::customer::Customer, services::StorageResultExt, state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Reject a customer missing any of the fields a record cannot do without.
fn validate(customer: &Customer) -> Result<(), AppError> {
    let missing: Vec<&str> = [
        ("firstName", &customer.first_name),
        ("lastName", &customer.last_name),
        ("email", &customer.email),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect();

    if !missing.is_empty() {
        return Err(AppError::bad_request(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    if !customer.email.contains('@') {
        return Err(AppError::bad_request("email is not a valid address"));
    }
    Ok(())
}

/// `GET /customers`: empty when the table cannot be read.
pub async fn list_customers(State(state): State<AppState>) -> Json<Vec<Customer>> {
    Json(
        state
            .tables
            .list_customers()
            .await
            .or_degrade(Vec::new(), "list customers"),
    )
}

/// `POST /customers`
pub async fn create_customer(
    State(state): State<AppState>,
    Json(customer): Json<Customer>,
) -> Result<impl IntoResponse, AppError> {
    validate(&customer)?;
    let created = state.tables.add_customer(customer).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /customers/{id}`
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, AppError> {
    Ok(Json(state.tables.get_customer(&id).await?))
}

/// `PUT /customers/{id}`: conditional when the body carries an `etag`.
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut customer): Json<Customer>,
) -> Result<Json<Customer>, AppError> {
    if !customer.customer_id.is_empty() && customer.customer_id != id {
        return Err(AppError::bad_request(format!(
            "customerId `{}` does not match the path id `{}`",
            customer.customer_id, id
        )));
    }
    customer.assign_id(id);
    validate(&customer)?;
    Ok(Json(state.tables.update_customer(customer).await?))
}

/// `DELETE /customers/{id}`
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.tables.delete_customer(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
