//! Mention token resolution.
//!
//! Rewrites raw `<@id>` / `<@!id>` tokens to display names using an
//! injected lookup, so the transform stays pure and testable without a
//! live user cache.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("mention pattern is valid"));

/// Replace every resolvable mention token in `text` with the user's
/// display name. Unresolvable tokens are left verbatim.
pub fn resolve_mentions<F>(text: &str, lookup: F) -> String
where
    F: Fn(u64) -> Option<String>,
{
    MENTION_RE
        .replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            match caps[1].parse::<u64>().ok().and_then(&lookup) {
                Some(name) => name,
                None => token.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(u64, &'a str)]) -> impl Fn(u64) -> Option<String> + 'a {
        let map: HashMap<u64, String> =
            pairs.iter().map(|(id, n)| (*id, n.to_string())).collect();
        move |id| map.get(&id).cloned()
    }

    #[test]
    fn test_no_mentions_is_identity() {
        let lookup = lookup_from(&[(1, "alice")]);
        assert_eq!(resolve_mentions("plain text", &lookup), "plain text");
        assert_eq!(resolve_mentions("", &lookup), "");
    }

    #[test]
    fn test_resolves_plain_and_nickname_forms() {
        let lookup = lookup_from(&[(42, "alice")]);
        assert_eq!(resolve_mentions("hi <@42>", &lookup), "hi alice");
        assert_eq!(resolve_mentions("hi <@!42>", &lookup), "hi alice");
    }

    #[test]
    fn test_repeated_mentions_all_replaced() {
        let lookup = lookup_from(&[(42, "alice")]);
        assert_eq!(
            resolve_mentions("<@42> and <@42> again", &lookup),
            "alice and alice again"
        );
    }

    #[test]
    fn test_unresolvable_left_verbatim() {
        let lookup = lookup_from(&[(42, "alice")]);
        assert_eq!(
            resolve_mentions("<@42> pinged <@99>", &lookup),
            "alice pinged <@99>"
        );
    }

    #[test]
    fn test_mixed_users() {
        let lookup = lookup_from(&[(1, "alice"), (2, "bob")]);
        assert_eq!(
            resolve_mentions("<@1> vs <@!2>", &lookup),
            "alice vs bob"
        );
    }

    #[test]
    fn test_malformed_tokens_untouched() {
        let lookup = lookup_from(&[(1, "alice")]);
        assert_eq!(resolve_mentions("<@> <@abc> <@1", &lookup), "<@> <@abc> <@1");
    }
}
