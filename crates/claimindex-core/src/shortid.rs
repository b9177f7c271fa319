//! Shortest-unique-prefix resolution for claim identifiers.
//!
//! When several claims share a name, each gets a canonical display form
//! `name#P` where `P` is the shortest prefix of its claim id that no other
//! claim of that name shares. A claim alone under its name needs no suffix.

/// Incremental shortest-unique-prefix resolver for one target identifier.
///
/// Feed every competing identifier through [`ShortId::step`], then call
/// [`ShortId::finalize`] to get the `#`-prefixed suffix (or the empty
/// string when there was no competition).
#[derive(Debug, Clone)]
pub struct ShortId {
    target: String,
    /// Longest common leading run seen so far, `None` until the first
    /// competitor.
    max_common: Option<usize>,
}

impl ShortId {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            max_common: None,
        }
    }

    /// Account for one competing identifier.
    pub fn step(&mut self, other: &str) {
        let run = common_run(&self.target, other);
        self.max_common = Some(self.max_common.map_or(run, |m| m.max(run)));
    }

    /// Required prefix length so far: one more than the longest common run,
    /// capped at the identifier's full length.
    pub fn prefix_len(&self) -> usize {
        match self.max_common {
            None => 0,
            Some(run) => (run + 1).min(self.target.chars().count()),
        }
    }

    /// The canonical suffix: `""` with no competitors, else `#` followed by
    /// the shortest disambiguating prefix.
    pub fn finalize(&self) -> String {
        match self.max_common {
            None => String::new(),
            Some(_) => {
                let prefix: String = self.target.chars().take(self.prefix_len()).collect();
                format!("#{prefix}")
            }
        }
    }
}

/// Length of the common leading-character run of two identifiers.
fn common_run(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Canonical display name for `target_id` among `peer_ids` (competing claim
/// ids of the same name, the target excluded).
pub fn canonical_name<'a>(
    name: &str,
    target_id: &str,
    peer_ids: impl IntoIterator<Item = &'a str>,
) -> String {
    let mut resolver = ShortId::new(target_id);
    for peer in peer_ids {
        resolver.step(peer);
    }
    format!("{name}{}", resolver.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_competition_no_suffix() {
        let resolver = ShortId::new("abcdef0123456789beef");
        assert_eq!(resolver.finalize(), "");
    }

    #[test]
    fn prefix_grows_with_closer_competitors() {
        let mut resolver = ShortId::new("abcdef0123456789beef");
        resolver.step("1bcdef0123456789beef");
        assert_eq!(resolver.finalize(), "#a");
        resolver.step("ab1def0123456789beef");
        assert_eq!(resolver.finalize(), "#abc");
        resolver.step("abc1ef0123456789beef");
        assert_eq!(resolver.finalize(), "#abcd");
        resolver.step("abcdef0123456789bee1");
        assert_eq!(resolver.finalize(), "#abcdef0123456789beef");
    }

    #[test]
    fn prefix_len_never_shrinks() {
        let mut resolver = ShortId::new("abcdef");
        resolver.step("ab1234");
        let after_close = resolver.prefix_len();
        resolver.step("zzzzzz");
        assert_eq!(resolver.prefix_len(), after_close);
    }

    #[test]
    fn identical_competitor_caps_at_full_length() {
        let mut resolver = ShortId::new("abcd");
        resolver.step("abcd");
        assert_eq!(resolver.finalize(), "#abcd");
    }

    #[test]
    fn canonical_name_formats() {
        assert_eq!(canonical_name("foo", "abcd", []), "foo");
        assert_eq!(canonical_name("foo", "abcd", ["axyz"]), "foo#ab");
    }
}
