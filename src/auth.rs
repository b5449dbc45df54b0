//! HTTP basic auth for the admin surface. Credentials are configured through
//! the environment and checked against the `Authorization` header.

use actix_web::{http, HttpRequest, HttpResponse};

use crate::app::Config;

fn expected_header(user: &str, password: &str) -> String {
    format!("Basic {}", base64::encode(&format!("{}:{}", user, password)))
}

fn is_authorized(header: Option<&str>, user: &str, password: &str) -> bool {
    header == Some(expected_header(user, password).as_str())
}

/// Challenges the request unless it carries the configured admin
/// credentials. `None` means the request is authorized.
pub(crate) fn check_basic_auth(req: &HttpRequest, config: &Config) -> Option<HttpResponse> {
    let header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if is_authorized(header, &config.basic_auth_user, &config.basic_auth_password) {
        None
    } else {
        Some(
            HttpResponse::Unauthorized()
                .header(
                    http::header::WWW_AUTHENTICATE,
                    "Basic realm=\"Login Required\"",
                )
                .body("You could not be authenticated. Please refresh the page."),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_credentials_are_authorized() {
        // "admin:password" in base64.
        assert!(is_authorized(
            Some("Basic YWRtaW46cGFzc3dvcmQ="),
            "admin",
            "password"
        ));
        let header = expected_header("user", "s3cret");
        assert!(is_authorized(Some(header.as_str()), "user", "s3cret"));
    }

    #[test]
    fn wrong_or_missing_credentials_are_rejected() {
        assert!(!is_authorized(None, "admin", "password"));
        assert!(!is_authorized(Some(""), "admin", "password"));
        assert!(!is_authorized(
            Some("Basic YWRtaW46cGFzc3dvcmQ="),
            "admin",
            "hunter2"
        ));
        assert!(!is_authorized(
            Some("Bearer YWRtaW46cGFzc3dvcmQ="),
            "admin",
            "password"
        ));
    }
}
