//! Helpers for tests that need an HTTP peer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use url::Url;

use taja_haat_core::{
    NewOrder, NewUser, Order, OrderId, OrderStatus, PhoneNumber, Product, ProductId,
    StatusUpdate, Taka, User, UserId,
};

use crate::api::ApiClient;

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// In-memory `/users` routes.
#[derive(Clone, Default)]
pub struct UserStub {
    pub users: Arc<Mutex<Vec<User>>>,
    pub fail_create: Arc<AtomicBool>,
}

impl UserStub {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/users", get(list_users).post(create_user))
            .with_state(self.clone())
    }

    pub async fn client(&self) -> ApiClient {
        ApiClient::new(&spawn(self.router()).await).unwrap()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

async fn list_users(
    State(stub): State<UserStub>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<User>> {
    let users = stub.users.lock().unwrap();
    Json(
        users
            .iter()
            .filter(|u| query.get("phone").is_none_or(|p| u.phone.as_str() == p))
            .cloned()
            .collect(),
    )
}

async fn create_user(
    State(stub): State<UserStub>,
    Json(new): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), (StatusCode, Json<Value>)> {
    if stub.fail_create.load(Ordering::SeqCst) {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "database unavailable" })),
        ));
    }

    let mut users = stub.users.lock().unwrap();
    if users.iter().any(|u| u.phone == new.phone) {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "phone already registered" })),
        ));
    }

    let user = User {
        id: UserId::generate(),
        uid: new.uid,
        name: new.name,
        phone: new.phone,
        role: new.role,
        address: new.address,
        image: new.image,
        is_phone_verified: new.is_phone_verified,
        created_at: Utc::now(),
    };
    users.push(user.clone());
    Ok((StatusCode::CREATED, Json(user)))
}

type ApiFailure = (StatusCode, Json<Value>);

fn failure(status: StatusCode, message: &str) -> ApiFailure {
    (status, Json(json!({ "error": message })))
}

/// In-memory `/orders` routes over a fixed product list.
///
/// Status writes check the version but not the transition table.
#[derive(Clone, Default)]
pub struct OrderStub {
    pub products: Arc<Mutex<Vec<Product>>>,
    pub orders: Arc<Mutex<Vec<Order>>>,
}

impl OrderStub {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/orders", get(list_orders).post(create_order))
            .route("/orders/{id}", get(get_order).put(update_order))
            .with_state(self.clone())
    }

    pub async fn client(&self) -> ApiClient {
        ApiClient::new(&spawn(self.router()).await).unwrap()
    }

    /// Add a product listed by `seller` at `price` taka per kg.
    pub fn add_product(&self, id: &str, seller: &str, price: i64) -> ProductId {
        let product = Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            category: "vegetables".to_string(),
            description: String::new(),
            unit: "kg".to_string(),
            price_per_unit: Taka::new(Decimal::from(price)),
            quantity_available: 100,
            seller_phone: PhoneNumber::parse(seller).unwrap(),
            seller_name: "Karim Uddin".to_string(),
            image: None,
            created_at: Utc::now(),
        };
        self.products.lock().unwrap().push(product);
        ProductId::new(id)
    }

    /// Change an order behind the client's back.
    pub fn bump_version(&self, id: &OrderId) {
        let mut orders = self.orders.lock().unwrap();
        if let Some(order) = orders.iter_mut().find(|o| &o.id == id) {
            order.version += 1;
        }
    }

    pub fn order(&self, id: &OrderId) -> Order {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| &o.id == id)
            .cloned()
            .unwrap()
    }
}

async fn list_orders(
    State(stub): State<OrderStub>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Order>> {
    let orders = stub.orders.lock().unwrap();
    Json(
        orders
            .iter()
            .filter(|o| query.get("buyer").is_none_or(|p| o.buyer_phone.as_str() == p))
            .filter(|o| query.get("seller").is_none_or(|p| o.seller_phone.as_str() == p))
            .filter(|o| query.get("status").is_none_or(|s| o.status.as_str() == s))
            .cloned()
            .collect(),
    )
}

async fn create_order(
    State(stub): State<OrderStub>,
    Json(new): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), ApiFailure> {
    let product = stub
        .products
        .lock()
        .unwrap()
        .iter()
        .find(|p| p.id == new.product_id)
        .cloned()
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "product not found"))?;

    let now = Utc::now();
    let order = Order {
        id: OrderId::generate(),
        product_id: product.id,
        product_name: product.name,
        quantity: new.quantity,
        price: product.price_per_unit.times(new.quantity),
        seller_phone: product.seller_phone,
        seller_name: product.seller_name,
        buyer_phone: new.buyer_phone,
        buyer_name: new.buyer_name,
        delivery_address: new.delivery_address,
        status: OrderStatus::Pending,
        version: 1,
        order_date: now,
        updated_at: now,
    };
    stub.orders.lock().unwrap().push(order.clone());
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(stub): State<OrderStub>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiFailure> {
    stub.orders
        .lock()
        .unwrap()
        .iter()
        .find(|o| o.id.as_str() == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "order not found"))
}

async fn update_order(
    State(stub): State<OrderStub>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, ApiFailure> {
    let mut orders = stub.orders.lock().unwrap();
    let order = orders
        .iter_mut()
        .find(|o| o.id.as_str() == id)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "order not found"))?;

    if order.version != update.version {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "stale version", "currentVersion": order.version })),
        ));
    }

    order.status = update.status;
    order.version += 1;
    order.updated_at = Utc::now();
    Ok(Json(order.clone()))
}

/// In-memory community collection routes with newest-wins upserts.
#[derive(Clone, Default)]
pub struct CollectionStub {
    pub records: Arc<Mutex<HashMap<(String, String), Value>>>,
    pub fail_push: Arc<AtomicBool>,
}

impl CollectionStub {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/{collection}", get(pull_records))
            .route("/{collection}/{id}", axum::routing::put(push_record))
            .with_state(self.clone())
    }

    pub async fn client(&self) -> ApiClient {
        ApiClient::new(&spawn(self.router()).await).unwrap()
    }

    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    /// Stored copy of one record.
    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.records
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Store a record as if another device had pushed it.
    pub fn insert(&self, collection: &str, record: &impl serde::Serialize) {
        let value = serde_json::to_value(record).unwrap();
        let id = value["id"].as_str().unwrap().to_string();
        self.records
            .lock()
            .unwrap()
            .insert((collection.to_string(), id), value);
    }

    pub fn count(&self, collection: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }
}

fn updated_at(record: &Value) -> chrono::DateTime<Utc> {
    record["updatedAt"].as_str().unwrap().parse().unwrap()
}

async fn pull_records(
    State(stub): State<CollectionStub>,
    Path(collection): Path<String>,
) -> Json<Vec<Value>> {
    let records = stub.records.lock().unwrap();
    Json(
        records
            .iter()
            .filter(|((c, _), _)| c == &collection)
            .map(|(_, v)| v.clone())
            .collect(),
    )
}

async fn push_record(
    State(stub): State<CollectionStub>,
    Path((collection, id)): Path<(String, String)>,
    Json(record): Json<Value>,
) -> Result<Json<Value>, ApiFailure> {
    if stub.fail_push.load(Ordering::SeqCst) {
        return Err(failure(StatusCode::SERVICE_UNAVAILABLE, "database unavailable"));
    }

    let mut records = stub.records.lock().unwrap();
    let key = (collection, id);
    match records.get(&key) {
        Some(stored) if updated_at(stored) >= updated_at(&record) => Ok(Json(stored.clone())),
        _ => {
            records.insert(key, record.clone());
            Ok(Json(record))
        }
    }
}
