use axum::response::Html;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// GET / — Browser chat client: connect as a client ID, send `recipient:message`
/// frames, and upload files whose links are then sent as messages.
pub async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}
