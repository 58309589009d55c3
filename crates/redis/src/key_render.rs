use hourglass_quota::CounterKey;

/// Render a [`CounterKey`] into a Redis key string.
///
/// The format is `feature:user:date`, or `prefix:feature:user:date` when a
/// prefix is configured.
pub fn render_key(prefix: &str, key: &CounterKey) -> String {
    if prefix.is_empty() {
        key.canonical()
    } else {
        format!("{prefix}:{}", key.canonical())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn key(feature: &str, user: &str) -> CounterKey {
        CounterKey::derive(feature, user, NaiveDate::from_ymd_opt(2024, 7, 9).unwrap())
    }

    #[test]
    fn renders_without_prefix() {
        assert_eq!(render_key("", &key("lattice", "pj11993")), "lattice:pj11993:2024-07-09");
    }

    #[test]
    fn renders_with_prefix() {
        assert_eq!(
            render_key("quota", &key("lattice", "pj11993")),
            "quota:lattice:pj11993:2024-07-09"
        );
    }

    #[test]
    fn renders_escaped_components() {
        assert_eq!(render_key("", &key("a:b", "c")), "a%3Ab:c:2024-07-09");
    }
}
