use std::sync::LazyLock;

use regex::Regex;

static SQLITE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sqlite:(?P<separators>/*)(?P<body>[^?#]*)").expect("valid sqlite url pattern")
});

/// Derives the database file path from a connection string.
///
/// | input                      | result            |
/// |----------------------------|-------------------|
/// | `sqlite:////data/x.db`     | `/data/x.db`      |
/// | `sqlite:///rel/x.db`       | `rel/x.db`        |
/// | `sqlite:x.db`              | `x.db`            |
/// | anything else              | `fallback_path`   |
///
/// Query strings and fragments are dropped. The result is advisory: it
/// targets sanity checks and the run lock, never the actual connection.
#[must_use]
pub fn resolve(connection_string: &str, fallback_path: &str) -> String {
    let Some(captures) = SQLITE_URL.captures(connection_string.trim()) else {
        return fallback_path.to_string();
    };

    let separators = captures["separators"].len();
    let body = &captures["body"];

    if body.is_empty() {
        return fallback_path.to_string();
    }

    match separators {
        4.. => format!("/{body}"),
        3 => body.to_string(),
        _ => format!("{}{body}", &captures["separators"]),
    }
}
