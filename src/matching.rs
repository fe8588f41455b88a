use crate::models::TruthBullet;

/// Implicit (chat-scan) matching: the message text must contain a bullet's
/// trigger or alias as a case-insensitive substring. The first match by
/// ascending id wins, which keeps the outcome deterministic when a message
/// would satisfy several bullets at once.
///
/// Matching runs over already-fetched rows, so LIKE/GLOB metacharacters in a
/// trigger (`%`, `_`, quotes) are always literal text.
pub fn find_implicit<'a>(bullets: &'a [TruthBullet], content: &str) -> Option<&'a TruthBullet> {
    let lowered = content.to_lowercase();
    bullets
        .iter()
        .filter(|b| !b.found)
        .find(|b| b.names().any(|name| lowered.contains(&name.to_lowercase())))
}

/// Explicit (command) matching: exact case-insensitive equality against a
/// bullet's trigger or alias, never substring containment.
pub fn find_exact<'a>(bullets: &'a [TruthBullet], name: &str) -> Option<&'a TruthBullet> {
    bullets.iter().find(|b| b.matches_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(id: i64, trigger: &str, aliases: &[&str]) -> TruthBullet {
        TruthBullet {
            id,
            guild_id: "g".into(),
            channel_id: "c".into(),
            trigger: trigger.into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            description: "d".into(),
            image: None,
            found: false,
            finder: None,
            found_at: None,
            hidden: false,
        }
    }

    #[test]
    fn test_implicit_substring_case_insensitive() {
        let bullets = vec![bullet(1, "Knife", &[])];
        let hit = find_implicit(&bullets, "I found the knife in the drawer").unwrap();
        assert_eq!(hit.id, 1);

        assert!(find_implicit(&bullets, "nothing here").is_none());
        // The trigger containing the message is not a match; containment is
        // message-contains-trigger only.
        assert!(find_implicit(&bullets, "kni").is_none());
    }

    #[test]
    fn test_implicit_matches_aliases() {
        let bullets = vec![bullet(1, "Bloody Knife", &["dagger"])];
        assert!(find_implicit(&bullets, "is that a DAGGER?").is_some());
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let bullets = vec![bullet(1, "100%_sure", &[])];
        assert!(find_implicit(&bullets, "i am 100%_sure of it").is_some());
        // `%` and `_` must not act as wildcards.
        assert!(find_implicit(&bullets, "i am 100x_sure of it").is_none());
        assert!(find_implicit(&bullets, "i am 100%asure of it").is_none());

        let quoted = vec![bullet(2, "mayor's key", &[])];
        assert!(find_implicit(&quoted, "grabbed the mayor's key quietly").is_some());
    }

    #[test]
    fn test_implicit_skips_found_and_breaks_ties_by_id() {
        let mut first = bullet(1, "knife", &[]);
        let second = bullet(2, "drawer", &[]);
        let bullets = vec![first.clone(), second.clone()];

        // Both triggers appear; lowest id wins.
        let hit = find_implicit(&bullets, "the knife in the drawer").unwrap();
        assert_eq!(hit.id, 1);

        first.found = true;
        first.finder = Some("u1".into());
        let bullets = vec![first, second];
        let hit = find_implicit(&bullets, "the knife in the drawer").unwrap();
        assert_eq!(hit.id, 2);
    }

    #[test]
    fn test_exact_requires_equality() {
        let bullets = vec![bullet(1, "Knife", &["dagger"])];
        assert!(find_exact(&bullets, "knife").is_some());
        assert!(find_exact(&bullets, "DAGGER").is_some());
        // Substrings and supersets both miss.
        assert!(find_exact(&bullets, "kni").is_none());
        assert!(find_exact(&bullets, "the knife").is_none());
    }
}
