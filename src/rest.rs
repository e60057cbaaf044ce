//! REST API layer for the admin panel using Axum
//!
//! Every protected handler follows the same shape: session from the cookie
//! (middleware), local validation, one connection, exactly one administrative
//! command, connection closed, server reply relayed back.
//! No handler caches anything between requests.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use mongodb::bson::{self, doc, Bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth;
use crate::config::Settings;
use crate::connection::{run_admin_command, AdminConnector};
use crate::error::AdminError;
use crate::models::{Account, ConnectionCredentials, PermissionSetRef};
use crate::permissions::{
    is_builtin_permission_set, PermissionGrant, PermissionSetBuilder, COLLECTION_ACTIONS,
    DATABASE_ACTIONS, GLOBAL_ACTIONS,
};

/// Shared app state for REST handlers (Arc-wrapped for concurrency).
/// Read-only after startup.
pub struct AppState {
    connector: Arc<dyn AdminConnector>,
    settings: Settings,
}

/// `{ success: true, message }` for commands with no payload
#[derive(Serialize, Deserialize, Debug)]
pub struct RestResponse {
    pub success: bool,
    pub message: String,
}

impl RestResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "mongoUrl")]
    pub server_uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreateAccountRequest {
    pub username: String,
    pub password: Option<String>,
    pub database: String,
    pub roles: Vec<PermissionSetRef>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct DeleteAccountRequest {
    pub username: String,
    pub database: String,
}

/// Body of both grant and revoke.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RoleAssignmentRequest {
    pub username: String,
    pub database: String,
    pub roles: Vec<PermissionSetRef>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePermissionSetRequest {
    pub role_name: String,
    pub database: String,
    pub privileges: Vec<PermissionGrant>,
    pub roles: Vec<PermissionSetRef>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DeletePermissionSetRequest {
    pub role_name: String,
    pub database: String,
    /// Set by clients that already know the set is built in (from the list).
    #[serde(alias = "isBuiltin")]
    pub builtin: bool,
}

async fn session_middleware(
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AdminError> {
    let credentials = auth::current_session(&jar).map_err(|_| AdminError::Unauthenticated)?;
    req.extensions_mut().insert(credentials);
    Ok(next.run(req).await)
}

/// Create Axum router with the auth and admin endpoints
pub fn create_router(connector: Arc<dyn AdminConnector>, settings: Settings) -> Router {
    let state = Arc::new(AppState {
        connector,
        settings,
    });

    let admin_routes = Router::new()
        .route(
            "/api/mongodb/users",
            get(list_accounts_handler)
                .post(create_account_handler)
                .delete(delete_account_handler),
        )
        .route(
            "/api/mongodb/roles",
            get(list_permission_sets_handler)
                .post(create_permission_set_handler)
                .delete(delete_permission_set_handler),
        )
        .route(
            "/api/mongodb/grant-roles",
            post(grant_roles_handler).delete(revoke_roles_handler),
        )
        .route_layer(middleware::from_fn(session_middleware));

    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/verify", get(verify_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/mongodb/actions", get(actions_handler))
        .route("/health", get(health_handler))
        .merge(admin_routes)
        .with_state(state)
}

fn required(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Role references without a db belong to the request's target database.
fn resolve_refs(roles: Vec<PermissionSetRef>, database: &str) -> Vec<PermissionSetRef> {
    roles
        .into_iter()
        .map(|mut r| {
            if r.db.is_empty() {
                r.db = database.to_string();
            }
            r
        })
        .collect()
}

fn to_bson<T: Serialize>(value: &T) -> Result<Bson, AdminError> {
    bson::to_bson(value).map_err(|e| AdminError::Internal(format!("bson encode: {}", e)))
}

async fn issue(
    state: &AppState,
    credentials: &ConnectionCredentials,
    database: &str,
    command: Document,
) -> Result<Document, AdminError> {
    run_admin_command(state.connector.as_ref(), credentials, database, command).await
}

/// Handler: login. Connect + ping first; the cookie is only set on success.
/// A username without a password (or the reverse) is a 400, never an
/// unauthenticated login.
async fn login_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<RestResponse>), AdminError> {
    let Json(payload) = payload?;

    let server_uri = payload.server_uri.unwrap_or_default();
    if !required(&server_uri) {
        return Err(AdminError::validation("Server URI is required"));
    }
    let credentials = ConnectionCredentials::new(server_uri, payload.username, payload.password);
    credentials.validate().map_err(AdminError::Validation)?;

    let connection = match state.connector.connect(&credentials).await {
        Ok(connection) => connection,
        Err(failure) => {
            tracing::info!(%failure, "login refused");
            return Err(failure.into());
        }
    };
    connection.close().await;

    tracing::info!(authenticated = credentials.is_authenticated(), "login succeeded");
    let jar = auth::login(jar, &credentials, state.settings.secure_cookies());
    Ok((jar, RestResponse::ok("Authentication successful")))
}

/// Handler: session check. Cookie lookup only, no connectivity check.
async fn verify_handler(jar: CookieJar) -> (StatusCode, Json<Value>) {
    match auth::current_session(&jar) {
        Ok(_) => (StatusCode::OK, Json(json!({ "authenticated": true }))),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "authenticated": false })),
        ),
    }
}

async fn logout_handler(jar: CookieJar) -> (CookieJar, Json<RestResponse>) {
    (auth::logout(jar), RestResponse::ok("Logged out"))
}

/// Handler: list accounts across all databases (`usersInfo`)
async fn list_accounts_handler(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<ConnectionCredentials>,
) -> Result<Json<Value>, AdminError> {
    let reply = issue(
        &state,
        &credentials,
        "admin",
        doc! { "usersInfo": { "forAllDBs": true } },
    )
    .await?;

    let users = reply.get("users").cloned().unwrap_or(Bson::Array(vec![]));
    let accounts: Vec<Account> = bson::from_bson(users)
        .map_err(|e| AdminError::Internal(format!("usersInfo reply: {}", e)))?;

    Ok(Json(json!({ "users": accounts })))
}

/// Handler: create account (`createUser`)
async fn create_account_handler(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<ConnectionCredentials>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<Json<RestResponse>, AdminError> {
    let Json(payload) = payload?;
    let password = payload.password.unwrap_or_default();

    if !required(&payload.username) || !required(&password) || !required(&payload.database) {
        return Err(AdminError::validation(
            "Username, password, and database are required",
        ));
    }
    if payload.roles.is_empty() {
        return Err(AdminError::validation("Select at least one role"));
    }

    let roles = resolve_refs(payload.roles, &payload.database);
    let command = doc! {
        "createUser": payload.username.as_str(),
        "pwd": password,
        "roles": to_bson(&roles)?,
    };
    issue(&state, &credentials, &payload.database, command).await?;

    tracing::info!(user = %payload.username, db = %payload.database, "account created");
    Ok(RestResponse::ok("User created successfully"))
}

/// Handler: delete account (`dropUser`)
async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<ConnectionCredentials>,
    payload: Result<Json<DeleteAccountRequest>, JsonRejection>,
) -> Result<Json<RestResponse>, AdminError> {
    let Json(payload) = payload?;
    if !required(&payload.username) || !required(&payload.database) {
        return Err(AdminError::validation("Username and database are required"));
    }

    issue(
        &state,
        &credentials,
        &payload.database,
        doc! { "dropUser": payload.username.as_str() },
    )
    .await?;

    tracing::info!(user = %payload.username, db = %payload.database, "account deleted");
    Ok(RestResponse::ok("User deleted successfully"))
}

fn validate_assignment(payload: &RoleAssignmentRequest) -> Result<(), AdminError> {
    if !required(&payload.username) || !required(&payload.database) || payload.roles.is_empty() {
        return Err(AdminError::validation(
            "Username, roles, and database are required",
        ));
    }
    Ok(())
}

/// Handler: grant permission sets to an account (`grantRolesToUser`)
async fn grant_roles_handler(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<ConnectionCredentials>,
    payload: Result<Json<RoleAssignmentRequest>, JsonRejection>,
) -> Result<Json<RestResponse>, AdminError> {
    let Json(payload) = payload?;
    validate_assignment(&payload)?;

    let roles = resolve_refs(payload.roles, &payload.database);
    let command = doc! {
        "grantRolesToUser": payload.username.as_str(),
        "roles": to_bson(&roles)?,
    };
    issue(&state, &credentials, &payload.database, command).await?;

    tracing::info!(user = %payload.username, count = roles.len(), "roles granted");
    Ok(RestResponse::ok("Roles granted successfully"))
}

/// Handler: revoke permission sets from an account (`revokeRolesFromUser`)
async fn revoke_roles_handler(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<ConnectionCredentials>,
    payload: Result<Json<RoleAssignmentRequest>, JsonRejection>,
) -> Result<Json<RestResponse>, AdminError> {
    let Json(payload) = payload?;
    validate_assignment(&payload)?;

    let roles = resolve_refs(payload.roles, &payload.database);
    let command = doc! {
        "revokeRolesFromUser": payload.username.as_str(),
        "roles": to_bson(&roles)?,
    };
    issue(&state, &credentials, &payload.database, command).await?;

    tracing::info!(user = %payload.username, count = roles.len(), "roles revoked");
    Ok(RestResponse::ok("Roles revoked successfully"))
}

/// Handler: list permission sets, built-in ones included (`rolesInfo`).
/// Definitions are relayed as the server sent them, plus `isBuiltin`.
async fn list_permission_sets_handler(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<ConnectionCredentials>,
) -> Result<Json<Value>, AdminError> {
    let command = doc! {
        "rolesInfo": 1,
        "showPrivileges": true,
        "showBuiltinRoles": true,
    };
    let reply = issue(&state, &credentials, &state.settings.roles_database, command).await?;

    let roles: Vec<Value> = match reply.get("roles") {
        Some(Bson::Array(roles)) => roles
            .iter()
            .cloned()
            .map(|role| {
                let mut role = role.into_relaxed_extjson();
                if let Value::Object(fields) = &mut role {
                    fields.entry("isBuiltin").or_insert(Value::Bool(false));
                }
                role
            })
            .collect(),
        _ => vec![],
    };

    Ok(Json(json!({ "roles": roles })))
}

/// Handler: create a custom permission set (`createRole`).
/// Grants go through the builder, so malformed ones never reach the server.
async fn create_permission_set_handler(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<ConnectionCredentials>,
    payload: Result<Json<CreatePermissionSetRequest>, JsonRejection>,
) -> Result<Json<RestResponse>, AdminError> {
    let Json(payload) = payload?;
    if !required(&payload.role_name) || !required(&payload.database) {
        return Err(AdminError::validation("Role name and database are required"));
    }

    let mut builder = payload
        .roles
        .into_iter()
        .fold(
            PermissionSetBuilder::new(&payload.role_name, &payload.database),
            PermissionSetBuilder::inherit,
        );
    for grant in payload.privileges {
        builder.add_grant(grant)?;
    }
    let definition = builder.build()?;

    let command = doc! {
        "createRole": definition.name.as_str(),
        "privileges": to_bson(&definition.grants)?,
        "roles": to_bson(&definition.inherited_sets)?,
    };
    issue(&state, &credentials, &definition.home_database, command).await?;

    tracing::info!(
        role = %definition.name,
        db = %definition.home_database,
        grants = definition.grants.len(),
        "permission set created"
    );
    Ok(RestResponse::ok("Role created successfully"))
}

/// Handler: delete a custom permission set (`dropRole`).
/// Built-in sets are refused here, before any connection is opened.
async fn delete_permission_set_handler(
    State(state): State<Arc<AppState>>,
    Extension(credentials): Extension<ConnectionCredentials>,
    payload: Result<Json<DeletePermissionSetRequest>, JsonRejection>,
) -> Result<Json<RestResponse>, AdminError> {
    let Json(payload) = payload?;
    if !required(&payload.role_name) || !required(&payload.database) {
        return Err(AdminError::validation("Role name and database are required"));
    }
    if payload.builtin || is_builtin_permission_set(&payload.role_name) {
        return Err(AdminError::validation(format!(
            "Built-in roles cannot be deleted: {}",
            payload.role_name
        )));
    }

    issue(
        &state,
        &credentials,
        &payload.database,
        doc! { "dropRole": payload.role_name.as_str() },
    )
    .await?;

    tracing::info!(role = %payload.role_name, db = %payload.database, "permission set deleted");
    Ok(RestResponse::ok("Role deleted successfully"))
}

/// Handler: the three fixed action vocabularies, for building privilege forms
async fn actions_handler() -> Json<Value> {
    Json(json!({
        "global": GLOBAL_ACTIONS,
        "database": DATABASE_ACTIONS,
        "collection": COLLECTION_ACTIONS,
    }))
}

/// Health check handler
async fn health_handler() -> Json<RestResponse> {
    RestResponse::ok("Admin panel healthy")
}
