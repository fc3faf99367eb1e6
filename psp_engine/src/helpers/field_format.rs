//! Format checks for the free-text fields of an order request.
use std::sync::OnceLock;

use log::*;
use regex::Regex;

static CURRENCY_CODE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static REGION_CODE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static URL: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn is_match(cell: &'static OnceLock<Result<Regex, regex::Error>>, pattern: &str, value: &str) -> bool {
    match cell.get_or_init(|| Regex::new(pattern)) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            error!("🔣️ Field pattern {pattern} does not compile. {e}");
            false
        },
    }
}

/// An ISO-4217 alphabetic currency code, in either case.
pub fn is_currency_code(value: &str) -> bool {
    is_match(&CURRENCY_CODE, r"^[A-Za-z]{3}$", value)
}

/// An ISO-3166-1 alpha-2 country code, in either case.
pub fn is_region_code(value: &str) -> bool {
    is_match(&REGION_CODE, r"^[A-Za-z]{2}$", value)
}

/// An absolute http(s) URL with a host.
pub fn is_url(value: &str) -> bool {
    is_match(&URL, r"^(?i:https?)://[^\s/?#:@]+(:\d{1,5})?([/?#]\S*)?$", value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn currency_and_region_codes() {
        assert!(is_currency_code("RUB"));
        assert!(is_currency_code("usd"));
        assert!(!is_currency_code("RU"));
        assert!(!is_currency_code("R1B"));
        assert!(!is_currency_code("РУБ"));
        assert!(is_region_code("fr"));
        assert!(!is_region_code("FRA"));
        assert!(!is_region_code(""));
    }

    #[test]
    fn urls() {
        assert!(is_url("https://acme.example/ok"));
        assert!(is_url("http://localhost:8080/notify?order=1"));
        assert!(is_url("HTTPS://acme.example"));
        assert!(!is_url("ftp://acme.example"));
        assert!(!is_url("acme.example/ok"));
        assert!(!is_url("https://"));
        assert!(!is_url("https://acme.example/with space"));
    }
}
