//! Defines the HTTP surface of the retail back office.
//!
//! ## Structure
//! - **Health**: `GET /healthz`, `GET /readyz`
//! - **Customers**: `GET|POST /customers`, `GET|PUT|DELETE /customers/{id}`
//! - **Products**: `GET|POST /products`, `GET /products/categories`,
//!   `GET|PUT|DELETE /products/{id}`, `POST /products/{id}/image`
//! - **Orders**: `GET|POST /orders`, `POST /orders/process`,
//!   `POST /orders/complete`
//! - **Inventory**: `GET|POST /inventory`, `POST /inventory/receive`,
//!   `POST /inventory/ack`
//! - **Blobs**: `GET|POST|PUT|HEAD /files/blobs/{container}`,
//!   `GET|DELETE /files/blobs/{container}/{name}`
//! - **Logs**: `GET /files/logs`, `GET|PUT|DELETE /files/logs/{name}`

use crate::{
    handlers::{
        customer_handlers::{
            create_customer, delete_customer, get_customer, list_customers, update_customer,
        },
        file_handlers::{
            create_container, delete_blob, delete_log, download_blob, get_log, head_container,
            list_blobs, list_logs, put_log, upload_blob,
        },
        health_handlers::{healthz, readyz},
        order_handlers::{
            ack_inventory, complete_order, inventory_queue_length, order_queue_length,
            place_order, process_order, receive_inventory, send_inventory,
        },
        product_handlers::{
            create_product, delete_product, get_product, list_categories, list_products,
            update_product, upload_product_image,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Largest accepted upload, multipart framing included.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the router for every route. Handlers share [`AppState`].
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // customers
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/{id}",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
        // products
        .route("/products", get(list_products).post(create_product))
        .route("/products/categories", get(list_categories))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/image", post(upload_product_image))
        // orders
        .route("/orders", get(order_queue_length).post(place_order))
        .route("/orders/process", post(process_order))
        .route("/orders/complete", post(complete_order))
        // inventory
        .route(
            "/inventory",
            get(inventory_queue_length).post(send_inventory),
        )
        .route("/inventory/receive", post(receive_inventory))
        .route("/inventory/ack", post(ack_inventory))
        // blobs
        .route(
            "/files/blobs/{container}",
            get(list_blobs)
                .post(upload_blob)
                .put(create_container)
                .head(head_container),
        )
        .route(
            "/files/blobs/{container}/{name}",
            get(download_blob).delete(delete_blob),
        )
        // logs
        .route("/files/logs", get(list_logs))
        .route(
            "/files/logs/{name}",
            get(get_log).put(put_log).delete(delete_log),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{disconnected_state, temp_state};
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn connected() -> (tempfile::TempDir, Router) {
        let (dir, state) = temp_state().await;
        (dir, routes().with_state(state))
    }

    fn multipart(boundary: &str, file_name: &str, content: &str, description: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{description}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\nFinance\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/pdf\r\n\r\n{content}\r\n--{b}--\r\n",
            b = boundary
        )
    }

    async fn create_customer(app: &Router) -> Value {
        let (status, customer) = send(
            app,
            Method::POST,
            "/customers",
            Some(json!({
                "firstName": "Thandi",
                "lastName": "Nkosi",
                "email": "thandi@example.com",
                "city": "Cape Town"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        customer
    }

    #[tokio::test]
    async fn healthz_is_ok_without_storage() {
        let app = routes().with_state(disconnected_state().await);
        let (status, body) = send(&app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn disconnected_storage_degrades_reads_and_rejects_writes() {
        let app = routes().with_state(disconnected_state().await);

        let (status, _) = send(&app, Method::GET, "/readyz", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = send(&app, Method::GET, "/customers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = send(&app, Method::GET, "/orders", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["queueLength"], -1);

        let (status, body) = send(
            &app,
            Method::POST,
            "/customers",
            Some(json!({"firstName": "A", "lastName": "B", "email": "a@b.c"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], 503);

        // The catalog keeps products browsable and writable.
        let (status, body) = send(&app, Method::GET, "/products", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, created) = send(
            &app,
            Method::POST,
            "/products",
            Some(json!({"name": "Kettle", "price": "349.99", "category": "Appliances"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["productId"], "prod-1");

        let (status, _) = send(&app, Method::DELETE, "/products/sample-1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, "/products/sample-1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::DELETE, "/products/sample-1", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn readyz_passes_with_storage() {
        let (_dir, app) = connected().await;
        let (status, body) = send(&app, Method::GET, "/readyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
        assert_eq!(body["checks"]["disk"]["ok"], true);
    }

    #[tokio::test]
    async fn customer_crud_and_missing_ids() {
        let (_dir, app) = connected().await;
        let customer = create_customer(&app).await;
        let id = customer["customerId"].as_str().unwrap().to_string();
        assert_eq!(customer["rowKey"], id.as_str());
        assert_eq!(customer["partitionKey"], "Customers");

        let (status, fetched) = send(&app, Method::GET, &format!("/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["city"], "Cape Town");

        let (status, _) = send(&app, Method::GET, "/customers/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/customers/{id}"),
            Some(json!({"customerId": "other", "firstName": "T", "lastName": "N", "email": "t@n.io"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::DELETE, &format!("/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::DELETE, &format!("/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stale_etag_update_is_a_conflict() {
        let (_dir, app) = connected().await;
        let customer = create_customer(&app).await;
        let id = customer["customerId"].as_str().unwrap().to_string();
        let (_, fetched) = send(&app, Method::GET, &format!("/customers/{id}"), None).await;

        let mut edit = fetched.clone();
        edit["city"] = json!("Durban");
        let (status, updated) =
            send(&app, Method::PUT, &format!("/customers/{id}"), Some(edit.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(updated["etag"], fetched["etag"]);
        assert_eq!(updated["createdDate"], fetched["createdDate"]);

        edit["city"] = json!("Pretoria");
        let (status, body) = send(&app, Method::PUT, &format!("/customers/{id}"), Some(edit)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], 409);
    }

    #[tokio::test]
    async fn products_fall_back_to_catalog_until_the_table_has_rows() {
        let (_dir, app) = connected().await;

        let (_, body) = send(&app, Method::GET, "/products?category=books", None).await;
        assert_eq!(body[0]["productId"], "sample-3");

        let (status, body) = send(&app, Method::GET, "/products/sample-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], "100.00");

        let (status, _) = send(&app, Method::GET, "/products/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, created) = send(
            &app,
            Method::POST,
            "/products",
            Some(json!({"name": "Kettle", "price": "349.99", "stockQuantity": 4, "category": "Appliances"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, listed) = send(&app, Method::GET, "/products", None).await;
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["productId"], created["productId"]);

        let (_, categories) = send(&app, Method::GET, "/products/categories", None).await;
        assert_eq!(
            categories,
            json!(["Appliances", "Books", "Clothing", "Electronics"])
        );

        let (status, _) = send(
            &app,
            Method::POST,
            "/products",
            Some(json!({"name": "Free lunch", "price": "free"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn order_total_is_priced_server_side_and_acknowledged_once() {
        let (_dir, app) = connected().await;
        let customer = create_customer(&app).await;
        let (_, product) = send(
            &app,
            Method::POST,
            "/products",
            Some(json!({"name": "Kettle", "price": "19.99", "category": "Appliances"})),
        )
        .await;

        let (status, order) = send(
            &app,
            Method::POST,
            "/orders",
            Some(json!({
                "customerId": customer["customerId"],
                "productId": product["productId"],
                "quantity": 3,
                "totalAmount": "0.01",
                "shippingAddress": "12 Long Street"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["totalAmount"], "59.97");
        assert_eq!(order["customerName"], "Thandi Nkosi");
        assert_eq!(order["status"], "Pending");

        let (_, length) = send(&app, Method::GET, "/orders", None).await;
        assert_eq!(length["queueLength"], 1);

        let (status, envelope) = send(&app, Method::POST, "/orders/process", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(envelope["payload"]["orderId"], order["orderId"]);
        assert_eq!(envelope["payload"]["notes"], "");
        assert_eq!(envelope["dequeueCount"], 1);

        let (_, empty) = send(&app, Method::POST, "/orders/process", None).await;
        assert_eq!(empty["message"], "No orders in the queue.");

        let ack = json!({"ackToken": envelope["ackToken"], "status": "Completed"});
        let (status, _) = send(&app, Method::POST, "/orders/complete", Some(ack.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::POST, "/orders/complete", Some(ack)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, length) = send(&app, Method::GET, "/orders", None).await;
        assert_eq!(length["queueLength"], 0);
    }

    #[tokio::test]
    async fn orders_reject_bad_input_before_touching_the_queue() {
        let (_dir, app) = connected().await;
        let customer = create_customer(&app).await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/orders",
            Some(json!({"customerId": customer["customerId"], "productId": "sample-2", "quantity": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/orders",
            Some(json!({"customerId": "ghost", "productId": "sample-2", "quantity": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/orders/complete",
            Some(json!({"ackToken": "not-a-token"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Catalog products are orderable.
        let (status, order) = send(
            &app,
            Method::POST,
            "/orders",
            Some(json!({"customerId": customer["customerId"], "productId": "sample-2", "quantity": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["totalAmount"], "100.00");
    }

    #[tokio::test]
    async fn inventory_messages_round_trip() {
        let (_dir, app) = connected().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/inventory")
            .body(Body::from("sku-42:+10"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let (_, envelope) = send(&app, Method::POST, "/inventory/receive", None).await;
        assert_eq!(envelope["payload"], "sku-42:+10");

        let (status, _) = send(
            &app,
            Method::POST,
            "/inventory/ack",
            Some(json!({"ackToken": envelope["ackToken"]})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, length) = send(&app, Method::GET, "/inventory", None).await;
        assert_eq!(length["queueLength"], 0);
    }

    #[tokio::test]
    async fn blob_upload_lists_downloads_and_logs() {
        let (_dir, app) = connected().await;
        let boundary = "retail-boundary";
        let request = Request::builder()
            .method(Method::POST)
            .uri("/files/blobs/documents")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(multipart(boundary, "invoice.pdf", "%PDF-1.4 test", "Q1 invoice")))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let (status, files) = send(&app, Method::GET, "/files/blobs/documents", None).await;
        assert_eq!(status, StatusCode::OK);
        let file = &files[0];
        assert_eq!(file["fileName"], "invoice.pdf");
        assert_eq!(file["description"], "Q1 invoice");
        assert!(file["fileSize"].as_i64().unwrap() > 0);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/files/blobs/documents/invoice.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4 test");

        let (status, _) = send(&app, Method::HEAD, "/files/blobs/documents", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::HEAD, "/files/blobs/missing-container", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, logs) = send(&app, Method::GET, "/files/logs", None).await;
        let logs = logs.as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].as_str().unwrap().starts_with("upload_"));

        let (status, _) =
            send(&app, Method::DELETE, "/files/blobs/documents/invoice.pdf", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) =
            send(&app, Method::GET, "/files/blobs/documents/invoice.pdf", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_without_a_file_is_rejected() {
        let (_dir, app) = connected().await;
        let boundary = "retail-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\nnothing\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/files/blobs/documents")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dot_file_names_are_rejected_for_blobs_and_logs() {
        let (_dir, app) = connected().await;
        let boundary = "retail-boundary";
        let request = Request::builder()
            .method(Method::POST)
            .uri("/files/blobs/documents")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(multipart(boundary, ".", "%PDF-1.4 test", "dot")))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let put = Request::builder()
            .method(Method::PUT)
            .uri("/files/logs/.")
            .body(Body::from("batch ok"))
            .unwrap();
        let response = app.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (_, files) = send(&app, Method::GET, "/files/blobs/documents", None).await;
        assert_eq!(files, json!([]));
    }

    #[tokio::test]
    async fn catalog_product_update_keeps_created_date() {
        let (_dir, app) = connected().await;
        let (_, original) = send(&app, Method::GET, "/products/sample-1", None).await;

        let (status, updated) = send(
            &app,
            Method::PUT,
            "/products/sample-1",
            Some(json!({"name": "Renamed sample", "price": "120.00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Renamed sample");
        assert_eq!(updated["createdDate"], original["createdDate"]);

        let (_, fetched) = send(&app, Method::GET, "/products/sample-1", None).await;
        assert_eq!(fetched["price"], "120.00");
        assert_eq!(fetched["createdDate"], original["createdDate"]);
    }

    #[tokio::test]
    async fn log_files_on_custom_share() {
        let (_dir, app) = connected().await;
        let put = Request::builder()
            .method(Method::PUT)
            .uri("/files/logs/nightly.log?share=audit")
            .body(Body::from("batch ok"))
            .unwrap();
        let response = app.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let get = Request::builder()
            .uri("/files/logs/nightly.log?share=audit")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(get).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"batch ok");

        let (_, names) = send(&app, Method::GET, "/files/logs?share=audit", None).await;
        assert_eq!(names, json!(["nightly.log"]));

        let (status, _) =
            send(&app, Method::DELETE, "/files/logs/nightly.log?share=audit", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, "/files/logs/nightly.log?share=audit", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // The deletion itself is logged on the default share.
        let (_, names) = send(&app, Method::GET, "/files/logs", None).await;
        assert!(names[0].as_str().unwrap().starts_with("delete_"));
    }
}
