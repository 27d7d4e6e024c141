use super::{
    config::CookieConfig,
    error::{AuthError, AuthResult},
};
use crate::handler::Request;
use cookie::{Cookie, CookieJar};
use hyper::header::COOKIE;

/// Cookie handling utility using the cookie crate
#[derive(Debug, Clone)]
pub struct CookieHandler;

impl CookieHandler {
    /// Extracts a specific cookie value from the request
    pub fn get_cookie_value(req: &Request, cookie_name: &str) -> AuthResult<Option<String>> {
        let jar = Self::get_all_cookies(req)?;
        Ok(jar
            .get(cookie_name)
            .map(|cookie| cookie.value().to_string()))
    }

    /// Gets all cookies from the request
    pub fn get_all_cookies(req: &Request) -> AuthResult<CookieJar> {
        let mut jar = CookieJar::new();

        for cookie_header in req.headers().get_all(COOKIE) {
            let cookie_str = cookie_header
                .to_str()
                .map_err(|_| AuthError::MalformedCookie)?;

            for cookie_str in cookie_str.split(';') {
                let cookie_str = cookie_str.trim();
                if !cookie_str.is_empty() {
                    match Cookie::parse(cookie_str.to_owned()) {
                        Ok(cookie) => jar.add_original(cookie),
                        Err(_) => continue, // Skip malformed individual cookies
                    }
                }
            }
        }

        Ok(jar)
    }

    /// Creates the long-lived client cookie
    pub fn create_client_cookie(value: &str, config: &CookieConfig) -> Cookie<'static> {
        let mut cookie = Cookie::build((config.cookie_name.clone(), value.to_owned()))
            .path(config.cookie_path.clone())
            .secure(config.secure_cookies)
            .http_only(true);

        if let Some(domain) = &config.cookie_domain {
            cookie = cookie.domain(domain.clone());
        }

        if let Some(same_site) = config.same_site {
            cookie = cookie.same_site(same_site);
        }

        if let Some(max_age) = config.max_age {
            cookie = cookie.max_age(cookie::time::Duration::seconds(max_age.as_secs() as i64));
        }

        cookie.build()
    }
}
