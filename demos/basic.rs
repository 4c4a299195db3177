//! Minimal restkit service: header auth, JSON endpoints and a health check.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8080/health
//!   curl -H 'x-user: alice' http://localhost:8080/users/1
//!   curl http://localhost:8080/users/1                      # 401
//!   curl -X POST http://localhost:8080/users \
//!        -H 'x-user: alice' -H 'content-type: application/json' \
//!        -d '{"name":""}'                                     # 400
//!   curl -H 'x-user: down' http://localhost:8080/users/1    # 503

use chrono::Utc;
use http::{Method, StatusCode};
use restkit::{
    AuthService, ErrorResponse, GetPrincipalDeviation, HealthBuildInfo, Json, OptionExt,
    Principal, Request, Response, Server, ServiceRouter, StaticHealthService, check_input,
};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
struct User {
    name: String,
    token: String,
}

#[derive(Serialize)]
struct UserLog {
    name: String,
}

impl Principal for User {
    type Log = UserLog;

    fn to_log(&self) -> UserLog {
        UserLog { name: self.name.clone() }
    }
}

struct HeaderAuth;

impl AuthService<User> for HeaderAuth {
    async fn get_principal(&self, req: &Request) -> Result<Option<User>, GetPrincipalDeviation> {
        match req.header("x-user") {
            Some("down") => Err(GetPrincipalDeviation::new("identity provider unreachable")),
            Some(name) => Ok(Some(User { name: name.to_owned(), token: format!("tok-{name}") })),
            None => Ok(None),
        }
    }
}

#[derive(Serialize)]
struct UserView {
    id: u32,
    name: &'static str,
}

#[derive(Deserialize)]
struct CreateUser {
    name: String,
}

fn lookup(id: u32) -> Option<UserView> {
    (id == 1).then_some(UserView { id, name: "alice" })
}

#[tokio::main]
async fn main() -> Result<(), restkit::Error> {
    tracing_subscriber::fmt::init();

    let service = ServiceRouter::<User>::for_principal(HeaderAuth, |_| {
        Response::status(StatusCode::SERVICE_UNAVAILABLE)
    })
    .health(StaticHealthService::new("basic", Utc::now(), HealthBuildInfo::from_env()))
    .build();

    let api = service.api_handler();
    let app = service.routing_handler(|routes| {
        routes
            .route(Method::GET, "/users/{id}", api.authed(|req: Request, _user: User| async move {
                let id: u32 = req.path("id")?;
                Ok::<_, ErrorResponse>(Json(lookup(id).or_not_found()?))
            }))
            .route(Method::POST, "/users", api.authed(|req: Request, user: User| async move {
                let input: CreateUser = req.json()?;
                check_input(!input.name.is_empty(), || "name is required")?;
                tracing::info!(by = %user.name, token_len = user.token.len(), "creating user");
                Ok::<_, ErrorResponse>(Json(input.name).with_status(StatusCode::CREATED))
            }))
            .route(Method::GET, "/whoami", api.auth_not_checked(|_req: Request, user: Option<User>| async move {
                Ok::<_, ErrorResponse>(user.map_or_else(|| "anonymous".to_owned(), |u| u.name))
            }));
    });

    Server::from_env(8080)?.serve(app).await
}
