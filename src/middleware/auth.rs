use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage, HttpRequest, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

pub use crate::services::auth_service::Claims;
use crate::models::Role;
use crate::services::auth_service::Authenticator;
use crate::utils::error::AppError;

pub const AUTH_TOKEN_COOKIE: &str = "authToken";
pub const USER_ID_COOKIE: &str = "userId";

/// Paths that need a session, matched with their sub-paths
pub const PROTECTED_PREFIXES: [&str; 2] = ["/dashboard", "/admin/dashboard"];
/// Protected paths that additionally need the admin role
pub const ADMIN_PREFIXES: [&str; 2] = ["/admin", "/dashboard/users"];

pub(crate) fn under(path: &str, prefix: &str) -> bool {
    path == prefix || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
}

pub(crate) fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| under(path, prefix))
}

/// The path as the router matches it, with any remaining escapes decoded.
/// `/%61dmin/dashboard` routes to `/admin/dashboard`, so it is gated as one.
pub(crate) fn routed_path(req: &ServiceRequest) -> String {
    let routed = req.match_info().as_str();
    match urlencoding::decode(routed) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => routed.to_string(),
    }
}

#[derive(Debug, PartialEq)]
pub enum GateDecision {
    Public,
    Allow(Claims),
    Login,
    Redirect(&'static str),
}

/// Decides what happens to a request for `path` with the given session cookies
pub fn evaluate(path: &str, token: Option<&str>, user_id: Option<&str>, auth: &Authenticator) -> GateDecision {
    if !is_protected(path) {
        return GateDecision::Public;
    }

    let (token, user_id) = match (token, user_id) {
        (Some(token), Some(user_id)) => (token, user_id),
        _ => return GateDecision::Login,
    };

    let claims = match auth.verify_token(token) {
        Ok(claims) if claims.sub == user_id => claims,
        Ok(claims) => {
            log::warn!("❌ Session cookie mismatch: token for {}, cookie says {}", claims.sub, user_id);
            return GateDecision::Login;
        }
        Err(e) => {
            log::debug!("Session rejected for {}: {}", path, e);
            return GateDecision::Login;
        }
    };

    if ADMIN_PREFIXES.iter().any(|prefix| under(path, prefix)) && claims.role != Role::Admin {
        log::warn!("⛔ {} is not an admin, denied {}", claims.sub, path);
        return GateDecision::Redirect(Role::User.landing_path());
    }

    GateDecision::Allow(claims)
}

/// Claims from the session cookie or, for API clients, a Bearer header
pub fn extract_claims(req: &HttpRequest, auth: &Authenticator) -> Result<Claims, AppError> {
    if let Some(cookie) = req.cookie(AUTH_TOKEN_COOKIE) {
        return auth.verify_token(cookie.value());
    }

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing session".to_string()))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid token format".to_string()))?;
    auth.verify_token(token)
}

/// Gates protected routes on the session cookies, redirecting to the login page
pub struct SessionGate {
    auth: Arc<Authenticator>,
    login_path: Rc<str>,
}

impl SessionGate {
    pub fn new(auth: Arc<Authenticator>, login_path: &str) -> Self {
        Self {
            auth,
            login_path: Rc::from(login_path),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionGateService {
            service,
            auth: self.auth.clone(),
            login_path: self.login_path.clone(),
        }))
    }
}

pub struct SessionGateService<S> {
    service: S,
    auth: Arc<Authenticator>,
    login_path: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for SessionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req.cookie(AUTH_TOKEN_COOKIE).map(|c| c.value().to_string());
        let user_id = req.cookie(USER_ID_COOKIE).map(|c| c.value().to_string());

        let path = routed_path(&req);

        let location = match evaluate(&path, token.as_deref(), user_id.as_deref(), &self.auth) {
            GateDecision::Public => None,
            GateDecision::Allow(claims) => {
                req.extensions_mut().insert(claims);
                None
            }
            GateDecision::Login => {
                let target = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or(path.as_str());
                log::info!("🔒 No valid session for {}, redirecting to login", path);
                Some(format!("{}?next={}", self.login_path, urlencoding::encode(target)))
            }
            GateDecision::Redirect(to) => Some(to.to_string()),
        };

        match location {
            None => {
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            Some(location) => {
                let response = HttpResponse::Found()
                    .insert_header((header::LOCATION, location))
                    .finish();
                Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRecord;
    use crate::services::auth_service::tests::test_authenticator;
    use actix_web::{cookie::Cookie, test as actix_test, web, App};

    fn user(id: &str, role: Role) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            name: "Gate Test".to_string(),
            email: format!("{}@city.lk", id),
            phone: String::new(),
            address: String::new(),
            role,
        }
    }

    #[test]
    fn test_prefix_matching() {
        assert!(under("/dashboard", "/dashboard"));
        assert!(under("/dashboard/map", "/dashboard"));
        assert!(!under("/dashboards", "/dashboard"));
        assert!(!under("/login", "/dashboard"));
        assert!(is_protected("/admin/dashboard/bins/b1"));
        assert!(!is_protected("/dashboards"));
    }

    #[test]
    fn test_public_paths_pass() {
        let auth = test_authenticator();
        assert_eq!(evaluate("/health", None, None, &auth), GateDecision::Public);
        assert_eq!(evaluate("/api/v1/auth/login", None, None, &auth), GateDecision::Public);
    }

    #[test]
    fn test_missing_or_bad_session_goes_to_login() {
        let auth = test_authenticator();
        assert_eq!(evaluate("/dashboard", None, None, &auth), GateDecision::Login);
        assert_eq!(evaluate("/dashboard", Some("garbage"), Some("u1"), &auth), GateDecision::Login);

        let token = auth.issue_token(&user("u1", Role::User)).unwrap();
        assert_eq!(evaluate("/dashboard", Some(&token), None, &auth), GateDecision::Login);
        assert_eq!(evaluate("/dashboard", Some(&token), Some("u2"), &auth), GateDecision::Login);
    }

    #[test]
    fn test_admin_paths_need_admin_role() {
        let auth = test_authenticator();
        let token = auth.issue_token(&user("u1", Role::User)).unwrap();
        assert_eq!(
            evaluate("/admin/dashboard", Some(&token), Some("u1"), &auth),
            GateDecision::Redirect("/dashboard")
        );
        assert_eq!(
            evaluate("/dashboard/users", Some(&token), Some("u1"), &auth),
            GateDecision::Redirect("/dashboard")
        );
        assert!(matches!(
            evaluate("/dashboard/profile", Some(&token), Some("u1"), &auth),
            GateDecision::Allow(_)
        ));

        let admin_token = auth.issue_token(&user("a1", Role::Admin)).unwrap();
        assert!(matches!(
            evaluate("/admin/dashboard/bins/b1", Some(&admin_token), Some("a1"), &auth),
            GateDecision::Allow(_)
        ));
    }

    async fn whoami(claims: web::ReqData<Claims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.sub.clone())
    }

    #[actix_web::test]
    async fn test_gate_redirects_and_attaches_claims() {
        let auth = Arc::new(test_authenticator());
        let app = actix_test::init_service(
            App::new()
                .wrap(SessionGate::new(auth.clone(), "/login"))
                .route("/dashboard", web::get().to(whoami))
                .route("/dashboard/map", web::get().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/dashboard/map?zoom=3").to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), 302);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/login?next=%2Fdashboard%2Fmap%3Fzoom%3D3"
        );

        let token = auth.issue_token(&user("u9", Role::User)).unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/dashboard")
            .cookie(Cookie::new(AUTH_TOKEN_COOKIE, token))
            .cookie(Cookie::new(USER_ID_COOKIE, "u9"))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"u9"));
    }

    #[actix_web::test]
    async fn test_encoded_paths_are_gated_like_plain_ones() {
        let auth = Arc::new(test_authenticator());
        let app = actix_test::init_service(
            App::new()
                .wrap(SessionGate::new(auth.clone(), "/login"))
                .route("/dashboard", web::get().to(whoami))
                .route("/dashboard/users", web::get().to(whoami))
                .route("/admin/dashboard", web::get().to(whoami)),
        )
        .await;

        for uri in ["/%64ashboard", "/%61dmin/dashboard", "/admin/%64ashboard"] {
            let req = actix_test::TestRequest::get().uri(uri).to_request();
            let res = actix_test::call_service(&app, req).await;
            assert_eq!(res.status(), 302, "{}", uri);
            assert!(res.headers().get(header::LOCATION).unwrap().to_str().unwrap().starts_with("/login?next="));
        }

        let token = auth.issue_token(&user("u4", Role::User)).unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/dashboard/%75sers")
            .cookie(Cookie::new(AUTH_TOKEN_COOKIE, token))
            .cookie(Cookie::new(USER_ID_COOKIE, "u4"))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), 302);
        assert_eq!(res.headers().get(header::LOCATION).unwrap(), "/dashboard");
    }

    #[actix_web::test]
    async fn test_extract_claims_from_bearer_header() {
        let auth = test_authenticator();
        let token = auth.issue_token(&user("u3", Role::User)).unwrap();

        let req = actix_test::TestRequest::default()
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .to_http_request();
        assert_eq!(extract_claims(&req, &auth).unwrap().sub, "u3");

        let bare = actix_test::TestRequest::default().to_http_request();
        assert!(extract_claims(&bare, &auth).is_err());
    }
}
