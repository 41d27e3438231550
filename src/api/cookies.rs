use crate::config::{AuthConfig, CookieConfig, SameSitePolicy};
use crate::domain::session::Session;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

/// Encodes a session into the three auth cookies: access (http-only),
/// refresh (http-only, value `"<id>.<secret>"`) and CSRF (readable by
/// client script for the double-submit echo). Clearing reuses the exact
/// attribute set used when setting, otherwise browsers keep the cookies.
#[derive(Clone, Debug)]
pub struct CookiePolicy {
    cookies: CookieConfig,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl CookiePolicy {
    pub fn new(cookies: CookieConfig, auth: &AuthConfig) -> Self {
        Self {
            cookies,
            access_ttl: Duration::seconds(auth.access_token_ttl_secs),
            refresh_ttl: Duration::seconds(auth.refresh_token_ttl_secs),
        }
    }

    pub fn refresh_cookie_name(&self) -> &str {
        &self.cookies.refresh_token_name
    }

    pub fn issue(&self, jar: CookieJar, session: &Session) -> CookieJar {
        let refresh_value =
            format!("{}.{}", session.refresh_token.id, session.refresh_token.value);

        let mut access =
            self.base(self.cookies.access_token_name.clone(), session.access_token.value.clone());
        access.set_max_age(self.access_ttl);

        let mut refresh = self.base(self.cookies.refresh_token_name.clone(), refresh_value);
        refresh.set_max_age(self.refresh_ttl);

        let mut csrf =
            self.base(self.cookies.csrf_token_name.clone(), session.csrf_token.clone());
        csrf.set_max_age(self.refresh_ttl);
        csrf.set_http_only(false);

        jar.add(access).add(refresh).add(csrf)
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let access = self.base(self.cookies.access_token_name.clone(), String::new());
        let refresh = self.base(self.cookies.refresh_token_name.clone(), String::new());
        let mut csrf = self.base(self.cookies.csrf_token_name.clone(), String::new());
        csrf.set_http_only(false);

        jar.remove(access).remove(refresh).remove(csrf)
    }

    fn base(&self, name: String, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(name, value);
        cookie.set_http_only(true);
        cookie.set_secure(self.cookies.secure);
        cookie.set_same_site(self.same_site());
        cookie.set_path(self.cookies.path.clone());
        if let Some(domain) = &self.cookies.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    const fn same_site(&self) -> SameSite {
        match self.cookies.same_site {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::{IssuedAccessToken, IssuedRefreshToken, UserProfile};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn policy() -> CookiePolicy {
        let cookies = CookieConfig {
            access_token_name: "access_token".to_string(),
            refresh_token_name: "refresh_token".to_string(),
            csrf_token_name: "csrf_token".to_string(),
            csrf_header_name: "x-csrf-token".to_string(),
            domain: None,
            path: "/".to_string(),
            same_site: SameSitePolicy::Strict,
            secure: true,
        };
        let auth = AuthConfig {
            jwt_secret: "test_secret".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 7200,
        };
        CookiePolicy::new(cookies, &auth)
    }

    fn session() -> Session {
        let now = OffsetDateTime::now_utc();
        Session {
            user: UserProfile {
                id: Uuid::new_v4(),
                username: "analima".to_string(),
                first_name: "Ana".to_string(),
                last_name: "Lima".to_string(),
            },
            access_token: IssuedAccessToken { value: "jwt-value".to_string(), expires_at: now },
            refresh_token: IssuedRefreshToken {
                id: Uuid::new_v4(),
                value: "rawsecret".to_string(),
                expires_at: now,
            },
            csrf_token: "csrf-value".to_string(),
        }
    }

    #[test]
    fn test_issue_sets_three_cookies_with_attributes() {
        let policy = policy();
        let session = session();
        let jar = policy.issue(CookieJar::new(), &session);

        let access = jar.get("access_token").unwrap();
        assert_eq!(access.value(), "jwt-value");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Strict));
        assert_eq!(access.max_age(), Some(Duration::seconds(3600)));

        let refresh = jar.get("refresh_token").unwrap();
        assert_eq!(refresh.value(), format!("{}.rawsecret", session.refresh_token.id));
        assert_eq!(refresh.http_only(), Some(true));
        assert_eq!(refresh.max_age(), Some(Duration::seconds(7200)));

        let csrf = jar.get("csrf_token").unwrap();
        assert_eq!(csrf.value(), "csrf-value");
        assert_ne!(csrf.http_only(), Some(true));
        assert_eq!(csrf.max_age(), Some(Duration::seconds(7200)));
    }

    #[test]
    fn test_clear_removes_all_three_cookies() {
        let policy = policy();
        let jar = policy.issue(CookieJar::new(), &session());
        let jar = policy.clear(jar);

        assert!(jar.get("access_token").is_none());
        assert!(jar.get("refresh_token").is_none());
        assert!(jar.get("csrf_token").is_none());
    }
}
