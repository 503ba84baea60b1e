use std::{net::SocketAddr, path::Path as FsPath, sync::Arc, time::Duration};

use axum::{
    async_trait,
    extract::{
        rejection::JsonRejection, DefaultBodyLimit, FromRequest, Multipart, Path, Request, State,
    },
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::image_host::ImageHost;
use crate::{mongo, token};

/* ================== Context ================== */

/// Shared per-process state, injected into every handler. The database
/// handle is pooled and safe for concurrent use; nothing else is mutable.
pub struct ApiCtx {
    pub db: Database,
    pub image_host: Option<ImageHost>,
    pub cfg: AppConfig,
}

/* ================== Utilities ================== */

fn now_iso_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn f64_from(d: &Document, k: &str) -> f64 {
    d.get_f64(k)
        .ok()
        .or_else(|| d.get_i64(k).ok().map(|v| v as f64))
        .or_else(|| d.get_i32(k).ok().map(|v| v as f64))
        .or_else(|| {
            d.get_str(k)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
        })
        .unwrap_or(0.0)
}

fn i64_from(d: &Document, k: &str) -> i64 {
    d.get_i64(k)
        .ok()
        .or_else(|| d.get_i32(k).ok().map(i64::from))
        .or_else(|| d.get_f64(k).ok().map(|v| v as i64))
        .unwrap_or(0)
}

fn opt_string(d: &Document, k: &str) -> Option<String> {
    d.get_str(k).ok().map(|s| s.to_string())
}

fn id_filter(id: &str) -> Document {
    doc! { "$or": [ { "id": id }, { "_id": id } ] }
}

/// Record ids are v4 UUID strings; anything else is rejected up front.
fn check_id(id: &str, what: &str) -> ApiResult<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} ID")))
}

/* ================== JSON extraction ================== */

/// `Json` with its rejection mapped onto the API error shape, so a
/// malformed body answers with `{"error": …}` like every other failure.
struct JsonBody<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rej| ApiError::BadRequest(rej.body_text()))?;
        Ok(JsonBody(value))
    }
}

/* ================== Models (HTTP only) ================== */

/* ---- Product ---- */

#[derive(Serialize, Deserialize, Clone)]
struct ProductDto {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub stock: i64,
    pub created_at: String,
    pub updated_at: String,
}

fn doc_to_product(d: Document) -> ProductDto {
    let image = d.get_str("image").unwrap_or_default().to_string();
    let mut image_url = opt_string(&d, "image_url").filter(|s| !s.is_empty());
    // Older records carry only the image reference; surface it as the
    // displayable URL so list responses stay uniform.
    if image_url.is_none() && !image.is_empty() {
        image_url = Some(image.clone());
    }

    ProductDto {
        id: d
            .get_str("id")
            .or_else(|_| d.get_str("_id"))
            .unwrap_or_default()
            .to_string(),
        name: d.get_str("name").unwrap_or_default().to_string(),
        price: f64_from(&d, "price"),
        description: d.get_str("description").unwrap_or_default().to_string(),
        category: d.get_str("category").unwrap_or_default().to_string(),
        image,
        image_url,
        stock: i64_from(&d, "stock"),
        created_at: d
            .get_str("created_at")
            .ok()
            .map(|s| s.to_string())
            .unwrap_or_else(now_iso_rfc3339),
        updated_at: d
            .get_str("updated_at")
            .ok()
            .map(|s| s.to_string())
            .unwrap_or_else(now_iso_rfc3339),
    }
}

/* ---- Admin ---- */

// The password hash never appears here; stripping happens by construction,
// not by clearing a field after the fact.
#[derive(Serialize, Deserialize, Clone)]
struct AdminDto {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub created_at: String,
}

fn doc_to_admin(d: Document) -> AdminDto {
    AdminDto {
        id: d
            .get_str("id")
            .or_else(|_| d.get_str("_id"))
            .unwrap_or_default()
            .to_string(),
        username: d.get_str("username").unwrap_or_default().to_string(),
        email: opt_string(&d, "email").filter(|s| !s.is_empty()),
        created_at: d
            .get_str("created_at")
            .ok()
            .map(|s| s.to_string())
            .unwrap_or_else(now_iso_rfc3339),
    }
}

/* ---- Stats ---- */

#[derive(Serialize)]
struct StatsDto {
    pub total_products: u64,
    pub total_admins: u64,
    pub total_value: f64,
}

/* ================== Request DTOs ================== */

/* ---- Product ---- */

#[derive(Deserialize)]
struct ProductCreateReq {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
    pub stock: Option<i64>,
}

#[derive(Deserialize)]
struct ProductUpdateReq {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
    pub stock: Option<i64>,
}

fn validate_new_product(req: &ProductCreateReq) -> ApiResult<(String, f64)> {
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Product name is required".into()))?;

    let price = req
        .price
        .ok_or_else(|| ApiError::BadRequest("Product price is required".into()))?;
    if price <= 0.0 {
        return Err(ApiError::BadRequest("Product price must be positive".into()));
    }

    Ok((name.to_string(), price))
}

/* ---- Admin / Auth ---- */

#[derive(Deserialize)]
struct AdminCreateReq {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
struct RegisterReq {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
struct LoginReq {
    pub username: Option<String>,
    pub password: Option<String>,
}

/* ================== Passwords ================== */

fn hash_password(plain: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| ApiError::Internal("Failed to hash password".into()))
}

fn verify_password(plain: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/* ================== Inline images ================== */

fn strip_base64_prefix(payload: &str) -> &str {
    match payload.find("base64,") {
        Some(idx) => &payload[idx + "base64,".len()..],
        None => payload,
    }
}

/// Replaces an inline base64 payload with a stored reference before the
/// product document is persisted; the payload itself never reaches the
/// database. Returns (image reference, displayable URL).
async fn resolve_inline_image(ctx: &ApiCtx, payload: &str) -> ApiResult<(String, String)> {
    if let Some(host) = &ctx.image_host {
        let data_uri = if payload.starts_with("data:") {
            payload.to_string()
        } else {
            format!("data:image/jpeg;base64,{payload}")
        };
        let hosted = host.upload(&data_uri).await?;
        return Ok((hosted.public_id, hosted.url));
    }

    // No external host configured: decode and keep the bytes under the
    // local upload directory instead.
    let raw = strip_base64_prefix(payload);
    let bytes = BASE64
        .decode(raw.trim())
        .map_err(|_| ApiError::BadRequest("Invalid image_base64 payload".into()))?;

    let name = format!("{}.jpg", Uuid::new_v4());
    let dest = FsPath::new(&ctx.cfg.upload_dir).join(&name);
    tokio::fs::write(&dest, &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("Error saving file: {e}")))?;

    Ok((name.clone(), format!("/static/uploads/{name}")))
}

/* ================== Routes: Health ================== */

async fn health(State(ctx): State<Arc<ApiCtx>>) -> Json<serde_json::Value> {
    let ping = ctx.db.run_command(doc! { "ping": 1 }, None).await;
    let (status, db_status) = match ping {
        Ok(_) => ("ok", "connected"),
        Err(_) => ("error", "disconnected"),
    };

    Json(json!({
        "status": status,
        "database": db_status,
        "timestamp": OffsetDateTime::now_utc().unix_timestamp(),
    }))
}

/* ================== Products CRUD ================== */

async fn products_list(State(ctx): State<Arc<ApiCtx>>) -> ApiResult<Json<serde_json::Value>> {
    let coll: Collection<Document> = ctx.db.collection("products");

    let mut cur = coll.find(doc! {}, mongo::sort_created_at_desc()).await?;

    let mut out = vec![];
    while let Some(docu) = cur.try_next().await? {
        out.push(doc_to_product(docu));
    }

    Ok(Json(json!({ "products": out })))
}

async fn product_create(
    State(ctx): State<Arc<ApiCtx>>,
    JsonBody(req): JsonBody<ProductCreateReq>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let (name, price) = validate_new_product(&req)?;

    let mut image = String::new();
    let mut image_url = req.image_url.clone().filter(|s| !s.is_empty());
    if let Some(payload) = req.image_base64.as_deref().filter(|s| !s.is_empty()) {
        let (img, url) = resolve_inline_image(&ctx, payload).await?;
        image = img;
        image_url = Some(url);
    }

    let id = Uuid::new_v4().to_string();
    let now = now_iso_rfc3339();
    let description = req.description.unwrap_or_default();
    let category = req.category.unwrap_or_default();
    let stock = req.stock.unwrap_or(0);

    let docu = doc! {
        "_id": &id,
        "id": &id,
        "name": &name,
        "price": price,
        "description": &description,
        "category": &category,
        "image": &image,
        "image_url": image_url.clone().map(Bson::String).unwrap_or(Bson::Null),
        "stock": stock,
        "created_at": &now,
        "updated_at": &now,
    };

    let coll: Collection<Document> = ctx.db.collection("products");
    coll.insert_one(docu, None).await?;

    let product = ProductDto {
        id,
        name,
        price,
        description,
        category,
        image,
        image_url,
        stock,
        created_at: now.clone(),
        updated_at: now,
    };

    Ok((StatusCode::CREATED, Json(json!({ "product": product }))))
}

async fn product_get(
    State(ctx): State<Arc<ApiCtx>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    check_id(&id, "product")?;

    let coll: Collection<Document> = ctx.db.collection("products");
    let docu = coll
        .find_one(id_filter(&id), None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    Ok(Json(json!({ "product": doc_to_product(docu) })))
}

/// Updates are a partial merge: only the supplied top-level fields are
/// replaced, everything else keeps its stored value.
async fn product_update(
    State(ctx): State<Arc<ApiCtx>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ProductUpdateReq>,
) -> ApiResult<Json<serde_json::Value>> {
    check_id(&id, "product")?;

    let mut set_doc = Document::new();

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("Product name must not be empty".into()));
        }
        set_doc.insert("name", name.trim());
    }
    if let Some(price) = req.price {
        if price <= 0.0 {
            return Err(ApiError::BadRequest("Product price must be positive".into()));
        }
        set_doc.insert("price", price);
    }
    if let Some(v) = req.description {
        set_doc.insert("description", v);
    }
    if let Some(v) = req.category {
        set_doc.insert("category", v);
    }
    if let Some(v) = req.stock {
        set_doc.insert("stock", v);
    }
    if let Some(v) = req.image_url.filter(|s| !s.is_empty()) {
        set_doc.insert("image_url", v);
    }
    if let Some(payload) = req.image_base64.as_deref().filter(|s| !s.is_empty()) {
        let (img, url) = resolve_inline_image(&ctx, payload).await?;
        set_doc.insert("image", img);
        set_doc.insert("image_url", url);
    }

    set_doc.insert("updated_at", now_iso_rfc3339());

    let coll: Collection<Document> = ctx.db.collection("products");
    let result = coll
        .update_one(id_filter(&id), doc! { "$set": set_doc }, None)
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Product not found".into()));
    }

    Ok(Json(json!({ "message": "Product updated successfully" })))
}

async fn product_delete(
    State(ctx): State<Arc<ApiCtx>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    check_id(&id, "product")?;

    let coll: Collection<Document> = ctx.db.collection("products");
    let result = coll.delete_one(id_filter(&id), None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Product not found".into()));
    }

    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

/* ================== Admins CRUD ================== */

async fn admins_list(State(ctx): State<Arc<ApiCtx>>) -> ApiResult<Json<serde_json::Value>> {
    let coll: Collection<Document> = ctx.db.collection("admins");

    let mut cur = coll.find(doc! {}, mongo::sort_created_at_desc()).await?;

    let mut out = vec![];
    while let Some(docu) = cur.try_next().await? {
        out.push(doc_to_admin(docu));
    }

    Ok(Json(json!({ "admins": out })))
}

async fn admin_create(
    State(ctx): State<Arc<ApiCtx>>,
    JsonBody(req): JsonBody<AdminCreateReq>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Username is required".into()))?;

    // Any password in the payload is hashed; plaintext is never stored.
    let password_hash = match req.password.as_deref().filter(|s| !s.is_empty()) {
        Some(plain) => hash_password(plain)?,
        None => String::new(),
    };

    let id = Uuid::new_v4().to_string();
    let created_at = now_iso_rfc3339();

    let docu = doc! {
        "_id": &id,
        "id": &id,
        "username": username,
        "email": req.email.clone().map(Bson::String).unwrap_or(Bson::Null),
        "password": password_hash,
        "created_at": &created_at,
    };

    let coll: Collection<Document> = ctx.db.collection("admins");
    coll.insert_one(docu, None).await?;

    let admin = AdminDto {
        id,
        username: username.to_string(),
        email: req.email,
        created_at,
    };

    Ok((StatusCode::CREATED, Json(json!({ "admin": admin }))))
}

async fn admin_delete(
    State(ctx): State<Arc<ApiCtx>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    check_id(&id, "admin")?;

    let coll: Collection<Document> = ctx.db.collection("admins");
    let result = coll.delete_one(id_filter(&id), None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Admin not found".into()));
    }

    Ok(Json(json!({ "message": "Admin deleted successfully" })))
}

/* ================== Auth: register / login ================== */

async fn register(
    State(ctx): State<Arc<ApiCtx>>,
    JsonBody(req): JsonBody<RegisterReq>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let (username, email, password) = match (&req.username, &req.email, &req.password) {
        (Some(u), Some(e), Some(p))
            if !u.trim().is_empty() && !e.trim().is_empty() && !p.is_empty() =>
        {
            (u.trim().to_string(), e.trim().to_string(), p.clone())
        }
        _ => {
            return Err(ApiError::BadRequest(
                "username, email and password are required".into(),
            ))
        }
    };

    let coll: Collection<Document> = ctx.db.collection("admins");

    // Friendly fast path; the unique index is what actually closes the
    // race between concurrent registrations.
    if coll
        .find_one(doc! { "username": &username }, None)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Username already exists".into()));
    }

    let hash = hash_password(&password)?;
    let id = Uuid::new_v4().to_string();
    let created_at = now_iso_rfc3339();

    let docu = doc! {
        "_id": &id,
        "id": &id,
        "username": &username,
        "email": &email,
        "password": hash,
        "created_at": &created_at,
    };

    coll.insert_one(docu, None).await?;

    let admin = AdminDto {
        id,
        username,
        email: Some(email),
        created_at,
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Registration successful", "admin": admin })),
    ))
}

async fn login(
    State(ctx): State<Arc<ApiCtx>>,
    JsonBody(req): JsonBody<LoginReq>,
) -> ApiResult<Json<serde_json::Value>> {
    let (username, password) = match (&req.username, &req.password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u.clone(), p.clone()),
        _ => {
            return Err(ApiError::BadRequest(
                "username and password are required".into(),
            ))
        }
    };

    let coll: Collection<Document> = ctx.db.collection("admins");
    let admin_doc = coll
        .find_one(doc! { "username": &username }, None)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    let stored_hash = admin_doc.get_str("password").unwrap_or("");
    if !verify_password(&password, stored_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let admin = doc_to_admin(admin_doc);
    let tok = token::issue(&ctx.cfg.token_secret, &admin.id)?;

    Ok(Json(json!({
        "message": "Login successful",
        "admin": admin,
        "token": tok,
    })))
}

/* ================== Upload ================== */

const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

fn allowed_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Timestamp-prefixed storage name; path components from the client are
/// discarded.
fn storage_name(filename: &str, ts: i64) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    format!("{ts}_{base}")
}

fn human_size(bytes: u64) -> String {
    format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
}

async fn upload(
    State(ctx): State<Arc<ApiCtx>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart form".into()))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::BadRequest("No selected file".into()))?;

        // Extension check happens before any bytes hit the disk.
        allowed_extension(&filename)
            .ok_or_else(|| ApiError::BadRequest("File not allowed".into()))?;

        let bytes = field.bytes().await.map_err(|e| {
            // Only a body-limit breach means "too large"; a truncated or
            // otherwise broken stream is a different failure.
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::BadRequest("File too large. Max 10MB".into())
            } else {
                ApiError::BadRequest("Invalid multipart form".into())
            }
        })?;
        if bytes.len() as u64 > ctx.cfg.max_file_size {
            return Err(ApiError::BadRequest(format!(
                "File too large. Max 10MB (file size: {})",
                human_size(bytes.len() as u64)
            )));
        }

        let stored = storage_name(&filename, OffsetDateTime::now_utc().unix_timestamp());
        let dest = FsPath::new(&ctx.cfg.upload_dir).join(&stored);
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Error saving file: {e}")))?;

        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "image_url": format!("/static/uploads/{stored}"),
                "file_size": human_size(bytes.len() as u64),
            })),
        ));
    }

    Err(ApiError::BadRequest("No file part".into()))
}

/* ================== Stats ================== */

async fn stats(State(ctx): State<Arc<ApiCtx>>) -> ApiResult<Json<serde_json::Value>> {
    let products: Collection<Document> = ctx.db.collection("products");
    let admins: Collection<Document> = ctx.db.collection("admins");

    // Three independent queries; values may reflect different points in
    // time under concurrent writes.
    let total_products = products.count_documents(doc! {}, None).await?;
    let total_admins = admins.count_documents(doc! {}, None).await?;

    let pipeline = vec![doc! {
        "$group": {
            "_id": null,
            "total": { "$sum": { "$multiply": ["$price", "$stock"] } },
        }
    }];
    let mut cur = products.aggregate(pipeline, None).await?;
    let total_value = match cur.try_next().await? {
        Some(d) => f64_from(&d, "total"),
        None => 0.0,
    };

    let stats = StatsDto {
        total_products,
        total_admins,
        total_value,
    };

    Ok(Json(json!({ "stats": stats })))
}

/* ================== Router / Runner ================== */

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}

pub fn build_router(ctx: Arc<ApiCtx>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Uploads may exceed axum's default body limit; allow a little slack
    // above the configured ceiling for the multipart framing.
    let body_limit = ctx.cfg.max_file_size as usize + 64 * 1024;

    // TODO: require a valid session token on the mutating routes. Login
    // issues one, but nothing checks it yet.
    Router::new()
        .route("/api/health", get(health))
        .route("/api/products", get(products_list).post(product_create))
        .route(
            "/api/products/:id",
            get(product_get).put(product_update).delete(product_delete),
        )
        .route("/api/admins", get(admins_list).post(admin_create))
        .route("/api/admins/:id", delete(admin_delete))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/upload", post(upload))
        .route("/api/stats", get(stats))
        .nest_service("/static/uploads", ServeDir::new(&ctx.cfg.upload_dir))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .with_state(ctx)
}

pub async fn run_http_server(cfg: AppConfig, db: Database) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    std::fs::create_dir_all(&cfg.upload_dir)?;

    let image_host = cfg.image_host_url.clone().map(ImageHost::new);
    if image_host.is_none() {
        tracing::info!(target: "http", "IMAGE_HOST_URL not set, inline images stay on local disk");
    }

    let port = cfg.port;
    let ctx = Arc::new(ApiCtx {
        db,
        image_host,
        cfg,
    });

    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "http", "[http] listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

/* ================== Tests ================== */
