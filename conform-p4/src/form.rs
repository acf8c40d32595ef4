//! Text forms and file arguments built from workspace descriptions.

use conform_core::{ClientTemplate, SyncTarget};

const CLIENT_OPTIONS: &str = "allwrite clobber nocompress unlocked nomodtime rmdir";

/// The `client -i` form for a stream client.
///
/// View lines are not written: the server derives the view from the stream.
pub fn client_spec(template: &ClientTemplate) -> String {
    let mut form = String::new();
    form.push_str(&format!("Client:\t{}\n\n", template.name));
    form.push_str(&format!("Owner:\t{}\n\n", template.owner));
    form.push_str(&format!("Host:\t{}\n\n", template.host));
    form.push_str(&format!("Root:\t{}\n\n", template.root.display()));
    form.push_str(&format!("Options:\t{CLIENT_OPTIONS}\n\n"));
    form.push_str("SubmitOptions:\tsubmitunchanged\n\n");
    form.push_str("LineEnd:\tlocal\n\n");
    form.push_str(&format!("Stream:\t{}\n", template.stream));
    form
}

/// File arguments that restrict a client-wide operation to `filters`.
///
/// Include lines (`/path/...` or `+/path/...`) replace the default
/// `//client/...`; exclusion lines (`-/path/...`) follow as `#none` so files
/// under them are removed from the workspace. `revision` is appended to
/// every include.
pub fn file_args(client: &str, filters: &[String], revision: Option<&str>) -> Vec<String> {
    let rev = revision.unwrap_or("");
    let mut includes = Vec::new();
    let mut excludes = Vec::new();
    for filter in filters.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
        if let Some(path) = filter.strip_prefix('-') {
            excludes.push(format!("{}#none", client_path(client, path)));
        } else {
            let path = filter.strip_prefix('+').unwrap_or(filter);
            includes.push(format!("{}{rev}", client_path(client, path)));
        }
    }
    if includes.is_empty() {
        includes.push(format!("//{client}/...{rev}"));
    }
    includes.extend(excludes);
    includes
}

fn client_path(client: &str, path: &str) -> String {
    format!("//{client}/{}", path.trim_start_matches('/'))
}

pub fn revision(target: SyncTarget) -> String {
    target.to_string()
}
