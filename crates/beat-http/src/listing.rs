use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::source::ListingEntry;

/// Characters escaped when a name is used as one URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// HTML index of a directory. Subdirectories are suffixed with `/`.
pub fn render_listing(url_path: &str, entries: &[ListingEntry]) -> String {
    let title = html_escape(url_path);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n<body>\n<h1>Index of {title}</h1>\n<ul>\n"
    );
    for entry in entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        let href = html_escape(&utf8_percent_encode(&entry.name, SEGMENT).to_string());
        let label = html_escape(&entry.name);
        html.push_str(&format!("<li><a href=\"{href}{suffix}\">{label}{suffix}</a></li>\n"));
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}
