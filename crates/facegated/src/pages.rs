//! Browser pages. Thin: all they decide is where to send the user based on
//! whether the session carries an identity.

use crate::gate;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use tower_sessions::Session;

const INDEX_HTML: &str = include_str!("../assets/index.html");
const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");
const LOGIN_JS: &str = include_str!("../assets/login.js");
const DASHBOARD_JS: &str = include_str!("../assets/dashboard.js");

/// Session store failure while rendering a page.
pub struct PageError(tower_sessions::session::Error);

impl From<tower_sessions::session::Error> for PageError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "session lookup failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "session error").into_response()
    }
}

pub async fn index(session: Session) -> Result<Response, PageError> {
    if gate::current_user(&session).await?.is_some() {
        return Ok(Redirect::to(gate::DASHBOARD_PATH).into_response());
    }
    Ok(Html(INDEX_HTML).into_response())
}

pub async fn dashboard(session: Session) -> Result<Response, PageError> {
    match gate::current_user(&session).await? {
        Some(user) => Ok(Html(render_dashboard(&user)).into_response()),
        None => Ok(Redirect::to("/").into_response()),
    }
}

pub async fn logout(session: Session) -> Result<Redirect, PageError> {
    gate::logout(&session).await?;
    Ok(Redirect::to("/"))
}

pub async fn login_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], LOGIN_JS)
}

pub async fn dashboard_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], DASHBOARD_JS)
}

fn render_dashboard(username: &str) -> String {
    DASHBOARD_HTML.replace("{{username}}", &escape_html(username))
}

/// Labels come from file names, which may contain markup characters.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::tests::fresh_session;
    use crate::gate::SESSION_USER_KEY;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"o'k\"</b> & co"), "&lt;b&gt;&quot;o&#39;k&quot;&lt;/b&gt; &amp; co");
    }

    #[test]
    fn test_render_dashboard_inserts_escaped_name() {
        let page = render_dashboard("<alice>");
        assert!(page.contains("&lt;alice&gt;"));
        assert!(!page.contains("{{username}}"));
    }

    #[tokio::test]
    async fn test_index_redirects_when_logged_in() {
        let session = fresh_session();
        session.insert(SESSION_USER_KEY, "alice").await.unwrap();
        let resp = index(session).await.ok().unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/dashboard");
    }

    #[tokio::test]
    async fn test_index_serves_login_page_when_anonymous() {
        let resp = index(fresh_session()).await.ok().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dashboard_redirects_when_anonymous() {
        let resp = dashboard(fresh_session()).await.ok().unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn test_logout_then_dashboard_redirects() {
        let session = fresh_session();
        session.insert(SESSION_USER_KEY, "alice").await.unwrap();
        logout(session.clone()).await.ok().unwrap();
        let resp = dashboard(session).await.ok().unwrap();
        assert_eq!(resp.headers()[header::LOCATION], "/");
    }
}
