/// Drops query string and fragment, which tend to carry tokens.
pub fn redact_url(url: &str) -> String {
    match url.find(|c: char| c == '?' || c == '#') {
        Some(index) => url[..index].to_string(),
        None => url.to_string(),
    }
}
