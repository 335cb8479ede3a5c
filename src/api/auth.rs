use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder, ResponseError};

use crate::middleware::auth::{extract_claims, AUTH_TOKEN_COOKIE, USER_ID_COOKIE};
use crate::models::{LoginRequest, SignupRequest, UserRecord};
use crate::services::auth_service::{self, AuthResponse, Authenticator};
use crate::store::DataSource;

fn session_cookie(name: &'static str, value: String, max_age_secs: i64, http_only: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(http_only);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::seconds(max_age_secs));
    cookie
}

/// authToken stays out of reach of page scripts; userId is read by the client
fn start_session(mut builder: HttpResponseBuilder, auth: &Authenticator, response: AuthResponse) -> HttpResponse {
    let ttl = auth.session_ttl_secs();
    builder
        .cookie(session_cookie(AUTH_TOKEN_COOKIE, response.token.clone(), ttl, true))
        .cookie(session_cookie(USER_ID_COOKIE, response.user.id.clone(), ttl, false))
        .json(response)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookies set", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    store: web::Data<dyn DataSource>,
    auth: web::Data<Authenticator>,
    request: web::Json<LoginRequest>,
) -> HttpResponse {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match auth_service::login(store.get_ref(), &auth, &request).await {
        Ok(response) => {
            log::info!("✅ Login successful: {} ({})", request.email, response.role.as_str());
            start_session(HttpResponse::Ok(), &auth, response)
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, session cookies set", body = AuthResponse),
        (status = 400, description = "Invalid signup form"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    store: web::Data<dyn DataSource>,
    auth: web::Data<Authenticator>,
    request: web::Json<SignupRequest>,
) -> HttpResponse {
    log::info!("📝 POST /auth/signup - email: {}", request.email);

    match auth_service::signup(store.get_ref(), &auth, &request).await {
        Ok(response) => start_session(HttpResponse::Created(), &auth, response),
        Err(e) => {
            log::warn!("❌ Signup failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cookies cleared")
    )
)]
pub async fn logout() -> HttpResponse {
    log::info!("👋 POST /auth/logout");

    HttpResponse::Ok()
        .cookie(session_cookie(AUTH_TOKEN_COOKIE, String::new(), 0, true))
        .cookie(session_cookie(USER_ID_COOKIE, String::new(), 0, false))
        .json(serde_json::json!({
            "success": true,
            "redirect": "/login"
        }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user profile", body = UserRecord),
        (status = 401, description = "Not logged in")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(
    req: HttpRequest,
    store: web::Data<dyn DataSource>,
    auth: web::Data<Authenticator>,
) -> HttpResponse {
    let claims = match extract_claims(&req, &auth) {
        Ok(claims) => claims,
        Err(e) => return e.error_response(),
    };

    match auth_service::current_user(store.get_ref(), &claims).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": user
        })),
        Err(e) => {
            log::warn!("❌ GET /auth/me failed for {}: {}", claims.sub, e);
            e.error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth_service::tests::{signup_request, test_authenticator};
    use crate::store::MemoryStore;
    use actix_web::{http::header, test, App};
    use std::sync::Arc;

    fn app_data() -> (web::Data<dyn DataSource>, web::Data<Authenticator>) {
        let store: Arc<dyn DataSource> = Arc::new(MemoryStore::new());
        (web::Data::from(store), web::Data::new(test_authenticator()))
    }

    #[actix_web::test]
    async fn test_signup_then_login_sets_session_cookies() {
        let (store, auth) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(store)
                .app_data(auth)
                .route("/signup", web::post().to(signup))
                .route("/login", web::post().to(login)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/signup")
            .set_json(serde_json::json!({
                "name": "Nimal Perera",
                "email": "Nimal@City.lk",
                "password": "secret123"
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 201);

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(serde_json::json!({ "email": "nimal@city.lk", "password": "secret123" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);

        {
            let cookies: Vec<Cookie> = res.response().cookies().collect();
            let token = cookies.iter().find(|c| c.name() == AUTH_TOKEN_COOKIE).unwrap();
            let user_id = cookies.iter().find(|c| c.name() == USER_ID_COOKIE).unwrap();
            assert_eq!(token.max_age(), Some(CookieDuration::seconds(3600)));
            assert_eq!(token.http_only(), Some(true));
            assert_eq!(token.path(), Some("/"));
            assert!(!user_id.value().is_empty());
        }

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["redirect"], "/dashboard");
        assert_eq!(body["user"]["role"], "user");
    }

    #[actix_web::test]
    async fn test_bad_password_is_unauthorized() {
        let (store, auth) = app_data();
        auth_service::signup(store.get_ref(), &auth, &signup_request("a@city.lk"))
            .await
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(store)
                .app_data(auth)
                .route("/login", web::post().to(login)),
        )
        .await;

        for email in ["a@city.lk", "nobody@city.lk"] {
            let req = test::TestRequest::post()
                .uri("/login")
                .set_json(serde_json::json!({ "email": email, "password": "wrong-pass" }))
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), 401);
            assert!(res.headers().get(header::SET_COOKIE).is_none());
        }
    }

    #[actix_web::test]
    async fn test_duplicate_signup_conflicts() {
        let (store, auth) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(store)
                .app_data(auth)
                .route("/signup", web::post().to(signup)),
        )
        .await;

        let form = serde_json::json!({ "name": "Dup", "email": "dup@city.lk", "password": "secret123" });
        let first = test::call_service(&app, test::TestRequest::post().uri("/signup").set_json(&form).to_request()).await;
        assert_eq!(first.status(), 201);
        let second = test::call_service(&app, test::TestRequest::post().uri("/signup").set_json(&form).to_request()).await;
        assert_eq!(second.status(), 409);
    }

    #[actix_web::test]
    async fn test_logout_expires_cookies() {
        let app = test::init_service(App::new().route("/logout", web::post().to(logout))).await;
        let res = test::call_service(&app, test::TestRequest::post().uri("/logout").to_request()).await;
        assert_eq!(res.status(), 200);

        let cookies: Vec<Cookie> = res.response().cookies().collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.max_age() == Some(CookieDuration::ZERO)));
    }

    #[actix_web::test]
    async fn test_me_requires_session() {
        let (store, auth) = app_data();
        let session = auth_service::signup(store.get_ref(), &auth, &signup_request("me@city.lk"))
            .await
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(store)
                .app_data(auth)
                .route("/me", web::get().to(me)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(res.status(), 401);

        let req = test::TestRequest::get()
            .uri("/me")
            .cookie(Cookie::new(AUTH_TOKEN_COOKIE, session.token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["user"]["email"], "me@city.lk");
    }
}
