//! Session cookies written on login and cleared on logout.
//!
//! The role is the only value that goes into the private (encrypted) jar;
//! the profile cookies stay readable so the dashboard can render the header
//! without a round trip.

use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar, PrivateCookieJar,
};
use time::Duration;

use super::{claims::Role, repo::StaffAccount};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const ROLE_COOKIE: &str = "role";

/// Plain cookies written next to the token. Order matters only for tests.
pub const PROFILE_COOKIES: [&str; 8] = [
    "logedIn", "userid", "name", "username", "phone", "email", "logo", "company",
];

fn build(name: &'static str, value: String, domain: Option<&str>, max_age: Duration) -> Cookie<'static> {
    let mut b = Cookie::build((name, value))
        .path("/")
        .max_age(max_age)
        .secure(true)
        .same_site(SameSite::Strict)
        .http_only(name == ACCESS_TOKEN_COOKIE);
    if let Some(d) = domain {
        b = b.domain(d.to_string());
    }
    b.build()
}

pub fn set_session(
    jar: CookieJar,
    private: PrivateCookieJar,
    account: &StaffAccount,
    role: Role,
    token: &str,
    age: Duration,
    domain: Option<&str>,
) -> (CookieJar, PrivateCookieJar) {
    let values: [(&'static str, Option<String>); 9] = [
        (ACCESS_TOKEN_COOKIE, Some(format!("Bearer {token}"))),
        ("logedIn", Some("true".into())),
        ("userid", Some(account.id.to_string())),
        ("name", Some(account.name.clone())),
        ("username", Some(account.username.clone())),
        ("phone", Some(account.phone.clone())),
        ("email", Some(account.email.clone())),
        ("logo", account.avatar.clone()),
        ("company", account.company.clone()),
    ];

    let jar = values
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .fold(jar, |jar, (k, v)| jar.add(build(k, v, domain, age)));
    let private = private.add(build(ROLE_COOKIE, role.as_str().to_string(), domain, age));
    (jar, private)
}

/// Cookie lifetime matching a token TTL, so the cookies never outlive the token.
pub fn max_age_for(ttl: std::time::Duration) -> Duration {
    Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

/// Expires every session cookie by overwriting it with `Max-Age=0`.
pub fn clear_session(
    jar: CookieJar,
    private: PrivateCookieJar,
    domain: Option<&str>,
) -> (CookieJar, PrivateCookieJar) {
    let jar = std::iter::once(ACCESS_TOKEN_COOKIE)
        .chain(PROFILE_COOKIES)
        .fold(jar, |jar, k| jar.add(build(k, String::new(), domain, Duration::ZERO)));
    let private = private.add(build(ROLE_COOKIE, String::new(), domain, Duration::ZERO));
    (jar, private)
}

/// Decrypts the role cookie. `None` when it is missing, tampered with or
/// encrypted under another key.
pub fn role_from(private: &PrivateCookieJar) -> Option<Role> {
    private.get(ROLE_COOKIE).and_then(|c| Role::parse(c.value()))
}
