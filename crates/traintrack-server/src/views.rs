//! Minimal HTML pages. The API itself answers in JSON.

use axum::response::Html;
use traintrack_core::types::Identity;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family:sans-serif;padding:2rem\">{body}</body></html>"
    ))
}

fn error_banner(error: Option<&str>) -> String {
    match error.filter(|e| !e.trim().is_empty()) {
        Some(e) => format!("<p class=\"error\" role=\"alert\">{}</p>", escape(e)),
        None => String::new(),
    }
}

pub fn home(identity: Option<&Identity>, error: Option<&str>) -> Html<String> {
    let greeting = match identity {
        Some(id) => format!(
            "<p>Signed in as <strong>{}</strong> ({}). <a href=\"/users/logout\">Log out</a></p>",
            escape(&id.username),
            id.role
        ),
        None => "<p><a href=\"/users/login\">Log in</a></p>".to_string(),
    };
    let body = format!(
        "<h1>TrainTrack</h1>{}{greeting}\
         <ul><li><a href=\"/datasets\">Datasets</a></li><li><a href=\"/models\">Models</a></li></ul>",
        error_banner(error)
    );
    page("TrainTrack", &body)
}

pub fn login(error: Option<&str>) -> Html<String> {
    let body = format!(
        "<h1>Log in</h1>{}\
         <form method=\"post\" action=\"/users/login\">\
         <input name=\"username\" placeholder=\"Username\">\
         <input name=\"password\" type=\"password\" placeholder=\"Password\">\
         <button type=\"submit\">Log in</button></form>\
         <h2>Register</h2>\
         <form method=\"post\" action=\"/users/register\">\
         <input name=\"username\" placeholder=\"Username\">\
         <input name=\"email\" type=\"email\" placeholder=\"Email\">\
         <input name=\"password\" type=\"password\" placeholder=\"Password\">\
         <button type=\"submit\">Register</button></form>",
        error_banner(error)
    );
    page("Log in - TrainTrack", &body)
}
