use std::cmp::Ordering;

/// Node ids are strings on the wire, but most of them are plain numbers.
/// Comparing "10" and "2" lexicographically would elect the wrong master,
/// so ids that parse as integers are ordered numerically.
pub fn cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

pub fn min<'a>(ids: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    ids.min_by(|a, b| cmp(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_order_numerically() {
        assert_eq!(cmp("2", "10"), Ordering::Less);
        assert_eq!(cmp("10", "2"), Ordering::Greater);
        assert_eq!(cmp("7", "7"), Ordering::Equal);
    }

    #[test]
    fn non_numeric_ids_order_lexicographically() {
        assert_eq!(cmp("node-a", "node-b"), Ordering::Less);
    }

    #[test]
    fn min_of_unordered_set() {
        let ids = ["3", "7", "1"];
        assert_eq!(min(ids.iter().copied()), Some("1"));
        let ids = ["7", "1", "3"];
        assert_eq!(min(ids.iter().copied()), Some("1"));
    }
}
