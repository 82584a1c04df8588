use std::sync::Arc;

pub type CityValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

const MAX_CITY_CHARS: usize = 50;

pub fn is_non_blank(city: &str) -> bool {
    !city.trim().is_empty()
}

/// 1 to 50 characters of Latin letters, spaces and `-'.,()`.
pub fn is_valid_city_name(city: &str) -> bool {
    let city = city.trim();
    let len = city.chars().count();
    if len == 0 || len > MAX_CITY_CHARS {
        return false;
    }

    city.chars().all(|c| {
        c.is_ascii_alphabetic()
            // Latin-1 letters and Latin Extended-A; × and ÷ are not letters.
            || (('\u{00C0}'..='\u{017F}').contains(&c) && c != '×' && c != '÷')
            || c.is_whitespace()
            || matches!(c, '-' | '\'' | '.' | ',' | '(' | ')')
    })
}

/// The trimmed name, or `None` when it fails [`is_valid_city_name`].
pub fn sanitize_city_name(city: &str) -> Option<String> {
    is_valid_city_name(city).then(|| city.trim().to_string())
}

pub fn non_blank() -> CityValidator {
    Arc::new(is_non_blank)
}

pub fn strict() -> CityValidator {
    Arc::new(is_valid_city_name)
}
