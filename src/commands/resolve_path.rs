use crate::jobs::resource_path;

/// Handle the `resolve-path` command - prints the filesystem path a
/// connection string resolves to.
pub fn handle_resolve_path_command(connection_string: &str, fallback: &str) -> i32 {
    println!("{}", resource_path::resolve(connection_string, fallback));
    0
}
