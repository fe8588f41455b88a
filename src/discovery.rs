use crate::db::Database;
use crate::error::InvestigationError;
use crate::matching;
use crate::models::TruthBullet;
use crate::scope;
use crate::{completion, fanout};
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{debug, info};

/// Handle a gateway message event: scan it for Truth Bullet triggers and run
/// the full discovery pipeline on a hit.
///
/// The cheap gates come first; the active-guild cache keeps inactive guilds
/// off the database entirely.
pub async fn handle_message(
    ctx: &serenity::Context,
    new_message: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = new_message.guild_id else {
        return Ok(());
    };
    if !data.active_guilds.contains(guild_id.get()) {
        return Ok(());
    }
    if !matches!(
        new_message.kind,
        serenity::MessageType::Regular | serenity::MessageType::InlineReply
    ) {
        return Ok(());
    }
    if new_message.content.is_empty() {
        return Ok(());
    }

    let gid = guild_id.to_string();
    let Some(config) = data.db.get_config(&gid)? else {
        return Ok(());
    };
    // The cache lags config writes by design; re-check against the row.
    if !config.is_active() {
        return Ok(());
    }

    // No player role configured blocks discovery outright.
    let Some(player_role) = parse_id(config.player_role.as_deref()).map(serenity::RoleId::new)
    else {
        return Ok(());
    };
    if !author_has_role(ctx, new_message, guild_id, player_role).await {
        return Ok(());
    }

    let scope_channel =
        scope::resolve_scope_channel(ctx, new_message.channel_id, config.thread_behavior).await;

    let claimed = claim_implicit(
        &data.db,
        &gid,
        &scope_channel.to_string(),
        &new_message.content,
        &new_message.author.id.to_string(),
    )?;
    let Some(bullet) = claimed else {
        return Ok(());
    };

    info!(
        "Truth Bullet `{}` found by {} in guild {}",
        bullet.trigger, new_message.author.name, guild_id
    );

    fanout::announce_discovery(ctx, data, &bullet, &new_message.author, new_message, &config)
        .await?;
    completion::evaluate(ctx, data, guild_id, &config).await?;
    Ok(())
}

/// Implicit-mode claim: match the message text against the channel's unfound
/// bullets and atomically mark the hit as found. Returns `None` on no match
/// or when a concurrent event claimed the same bullet first.
pub fn claim_implicit(
    db: &Database,
    guild_id: &str,
    channel_id: &str,
    content: &str,
    finder: &str,
) -> Result<Option<TruthBullet>, InvestigationError> {
    let bullets = db.list_unfound_bullets(guild_id, channel_id)?;
    let Some(hit) = matching::find_implicit(&bullets, content) else {
        return Ok(None);
    };

    if !db.mark_found(hit.id, finder)? {
        debug!("Lost discovery race for bullet {} to an earlier claim", hit.id);
        return Ok(None);
    }

    Ok(Some(claimed(hit, finder)))
}

/// Explicit-mode claim: exact trigger/alias equality, with distinct errors
/// for an unknown name, an already-found bullet, and a lost race.
pub fn claim_exact(
    db: &Database,
    guild_id: &str,
    channel_id: &str,
    name: &str,
    finder: &str,
) -> Result<TruthBullet, InvestigationError> {
    let bullets = db.list_bullets(guild_id, channel_id)?;
    let Some(hit) = matching::find_exact(&bullets, name) else {
        return Err(InvestigationError::NotFound(name.to_string()));
    };
    if hit.found {
        return Err(InvestigationError::AlreadyFound);
    }
    if !db.mark_found(hit.id, finder)? {
        // Someone beat this invocation between the read and the claim.
        return Err(InvestigationError::AlreadyFound);
    }
    Ok(claimed(hit, finder))
}

fn claimed(hit: &TruthBullet, finder: &str) -> TruthBullet {
    let mut bullet = hit.clone();
    bullet.found = true;
    bullet.finder = Some(finder.to_string());
    bullet
}

pub(crate) fn parse_id(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.parse().ok())
}

async fn author_has_role(
    ctx: &serenity::Context,
    message: &serenity::Message,
    guild_id: serenity::GuildId,
    role_id: serenity::RoleId,
) -> bool {
    // Gateway message events usually carry the partial member inline.
    if let Some(member) = message.member.as_deref() {
        return member.roles.contains(&role_id);
    }
    match guild_id.member(ctx, message.author.id).await {
        Ok(member) => member.roles.contains(&role_id),
        Err(e) => {
            debug!(
                "Could not fetch member {} in guild {}: {}",
                message.author.id, guild_id, e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBullet;

    fn test_db() -> Database {
        let db = Database::new(":memory:").unwrap();
        db.execute_init().unwrap();
        db
    }

    fn seed_bullet(db: &Database, trigger: &str) -> i64 {
        db.create_bullet(&NewBullet {
            guild_id: "g1".into(),
            channel_id: "c1".into(),
            trigger: trigger.into(),
            description: "a clue".into(),
            image: None,
            hidden: false,
        })
        .unwrap()
    }

    #[test]
    fn test_implicit_claim_transitions_state() {
        let db = test_db();
        seed_bullet(&db, "knife");

        let bullet = claim_implicit(&db, "g1", "c1", "I found the knife in the drawer", "u1")
            .unwrap()
            .expect("should match");
        assert!(bullet.found);
        assert_eq!(bullet.finder.as_deref(), Some("u1"));

        // Persisted state agrees with the returned bullet.
        let stored = db.get_bullet("g1", "c1", "knife").unwrap();
        assert!(stored.found);
        assert_eq!(stored.finder.as_deref(), Some("u1"));

        // Everything in the guild is found now.
        assert!(!db.any_unfound_in_guild("g1").unwrap());
    }

    #[test]
    fn test_second_implicit_claim_is_void() {
        let db = test_db();
        seed_bullet(&db, "knife");

        assert!(claim_implicit(&db, "g1", "c1", "the knife!", "u1")
            .unwrap()
            .is_some());
        // The same message from another user no longer matches anything.
        assert!(claim_implicit(&db, "g1", "c1", "the knife!", "u2")
            .unwrap()
            .is_none());

        let stored = db.get_bullet("g1", "c1", "knife").unwrap();
        assert_eq!(stored.finder.as_deref(), Some("u1"));
    }

    #[test]
    fn test_implicit_claim_respects_channel_scope() {
        let db = test_db();
        seed_bullet(&db, "knife");
        assert!(claim_implicit(&db, "g1", "c2", "the knife!", "u1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_exact_claim_rejects_found_and_unknown() {
        let db = test_db();
        seed_bullet(&db, "knife");

        assert!(matches!(
            claim_exact(&db, "g1", "c1", "rope", "u1"),
            Err(InvestigationError::NotFound(_))
        ));

        // Exact mode requires equality, not containment.
        assert!(matches!(
            claim_exact(&db, "g1", "c1", "the knife", "u1"),
            Err(InvestigationError::NotFound(_))
        ));

        let bullet = claim_exact(&db, "g1", "c1", "KNIFE", "u1").unwrap();
        assert_eq!(bullet.finder.as_deref(), Some("u1"));

        // A command-triggered discovery on a found bullet is an error, and
        // leaves the original finder untouched.
        assert!(matches!(
            claim_exact(&db, "g1", "c1", "knife", "u2"),
            Err(InvestigationError::AlreadyFound)
        ));
        assert_eq!(
            db.get_bullet("g1", "c1", "knife").unwrap().finder.as_deref(),
            Some("u1")
        );
    }
}
