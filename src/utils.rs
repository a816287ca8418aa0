/// Shared helpers for city names, clock times and contact fields
///
/// Normalize a location string for favorite matching
///
/// Location strings come back from reverse geocoding and the backend in
/// different shapes ("Connaught Place, Delhi, India" vs "Delhi"). The
/// trailing country token is dropped and the most specific remaining segment
/// (the last one) is compared case-insensitively.
///
/// # Examples
///
/// ```
/// use aqi_dashboard::utils::normalize_city_name;
///
/// assert_eq!(normalize_city_name("Connaught Place, Delhi, India"), "delhi");
/// assert_eq!(normalize_city_name("Delhi"), "delhi");
/// assert_eq!(normalize_city_name("  Navi Mumbai , Maharashtra,india "), "maharashtra");
/// ```
pub fn normalize_city_name(value: &str) -> String {
    let mut segments: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    while segments.len() > 1
        && segments
            .last()
            .is_some_and(|s| s.eq_ignore_ascii_case("india"))
    {
        segments.pop();
    }

    segments
        .last()
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Whether two location strings name the same city after normalization
pub fn same_city(a: &str, b: &str) -> bool {
    let a = normalize_city_name(a);
    !a.is_empty() && a == normalize_city_name(b)
}

/// Parse an `HH:MM` clock time into minutes since midnight
///
/// # Examples
///
/// ```
/// use aqi_dashboard::utils::parse_clock_minutes;
///
/// assert_eq!(parse_clock_minutes("06:00"), Some(360));
/// assert_eq!(parse_clock_minutes("23:59"), Some(1439));
/// assert_eq!(parse_clock_minutes("24:00"), None);
/// assert_eq!(parse_clock_minutes("7.30"), None);
/// ```
pub fn parse_clock_minutes(value: &str) -> Option<u32> {
    let (hours, minutes) = value.trim().split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

pub fn is_valid_email(value: &str) -> bool {
    regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .map(|re| re.is_match(value.trim()))
        .unwrap_or(false)
}

/// Phone numbers for WhatsApp delivery: optional `+`, then 7 to 15 digits,
/// spaces and dashes ignored
pub fn is_valid_phone(value: &str) -> bool {
    let compact: String = value
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    regex::Regex::new(r"^\+?\d{7,15}$")
        .map(|re| re.is_match(&compact))
        .unwrap_or(false)
}
