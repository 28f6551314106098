use crate::types::Metric;

/// Normalizes a configured server address into a base URL.
///
/// Addresses without an explicit scheme get `http://` prepended.
pub fn base_url(address: &str) -> String {
    let addr = address.trim().trim_end_matches('/');
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

/// Builds the raw-update URL `<base>/update/<kind>/<id>/<numericText>`.
pub fn update_url(base: &str, metric: &Metric) -> String {
    format!("{base}/update/{}/{}/{}", metric.kind(), metric.id, metric.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_added_when_missing() {
        assert_eq!(base_url("localhost:8080"), "http://localhost:8080");
        assert_eq!(base_url(" localhost:8080/ "), "http://localhost:8080");
        assert_eq!(base_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn update_url_formats_both_kinds() {
        let base = base_url("localhost:8080");
        assert_eq!(
            update_url(&base, &Metric::gauge("Alloc", 3.14)),
            "http://localhost:8080/update/gauge/Alloc/3.14"
        );
        assert_eq!(
            update_url(&base, &Metric::counter("PollCount", 7)),
            "http://localhost:8080/update/counter/PollCount/7"
        );
    }
}
