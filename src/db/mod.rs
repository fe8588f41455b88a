use crate::error::InvestigationError;
use crate::models::{
    validate_alias, validate_description, validate_image_url, validate_trigger, GuildConfig,
    InvestigationType, NewBullet, ThreadBehavior, TruthBullet, MAX_ALIASES,
};
use rusqlite::{Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

type Result<T> = std::result::Result<T, InvestigationError>;

/// Persistent store for Truth Bullets and per-guild investigation config.
///
/// IDs are stored as TEXT and converted to/from `u64` at the edges. The
/// connection mutex is held for the full duration of each operation, so
/// check-then-write sequences (uniqueness validation, finder overrides) do
/// not interleave with other writers.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn execute_init(&self) -> Result<()> {
        info!("Database: Initializing schema...");
        let sql = r#"
            CREATE TABLE IF NOT EXISTS truth_bullets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                "trigger" TEXT NOT NULL,
                aliases TEXT NOT NULL DEFAULT '[]',
                description TEXT NOT NULL,
                image TEXT,
                found BOOLEAN NOT NULL DEFAULT FALSE,
                finder TEXT,
                found_at DATETIME,
                hidden BOOLEAN NOT NULL DEFAULT FALSE
            );
            CREATE INDEX IF NOT EXISTS idx_bullets_guild_channel
                ON truth_bullets (guild_id, channel_id);
            CREATE INDEX IF NOT EXISTS idx_bullets_guild_found
                ON truth_bullets (guild_id, found);

            CREATE TABLE IF NOT EXISTS investigation_configs (
                guild_id TEXT PRIMARY KEY,
                player_role TEXT,
                bullets_enabled BOOLEAN NOT NULL DEFAULT FALSE,
                bullet_channel_id TEXT,
                best_finder_role TEXT,
                investigation_type INTEGER NOT NULL DEFAULT 1,
                thread_behavior INTEGER NOT NULL DEFAULT 1,
                show_best_finders BOOLEAN NOT NULL DEFAULT TRUE
            );
        "#;
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    // --- Truth Bullets ---

    pub fn create_bullet(&self, bullet: &NewBullet) -> Result<i64> {
        validate_trigger(&bullet.trigger)?;
        validate_description(&bullet.description)?;
        if let Some(image) = bullet.image.as_deref() {
            validate_image_url(image)?;
        }

        let conn = self.conn.lock().unwrap();
        let existing = channel_bullets(&conn, &bullet.guild_id, &bullet.channel_id)?;
        if namespace_conflict(&existing, &bullet.trigger, None) {
            return Err(InvestigationError::AlreadyExists(bullet.trigger.clone()));
        }

        conn.execute(
            r#"INSERT INTO truth_bullets (guild_id, channel_id, "trigger", aliases, description, image, hidden)
               VALUES (?1, ?2, ?3, '[]', ?4, ?5, ?6)"#,
            (
                &bullet.guild_id,
                &bullet.channel_id,
                &bullet.trigger,
                &bullet.description,
                &bullet.image,
                bullet.hidden,
            ),
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All bullets registered in one channel, ascending id.
    pub fn list_bullets(&self, guild_id: &str, channel_id: &str) -> Result<Vec<TruthBullet>> {
        let conn = self.conn.lock().unwrap();
        channel_bullets(&conn, guild_id, channel_id)
    }

    /// Not-yet-found bullets in one channel, ascending id. This is the set
    /// the trigger matcher scans.
    pub fn list_unfound_bullets(&self, guild_id: &str, channel_id: &str) -> Result<Vec<TruthBullet>> {
        let bullets = self.list_bullets(guild_id, channel_id)?;
        Ok(bullets.into_iter().filter(|b| !b.found).collect())
    }

    /// Look up a bullet by trigger or alias, case-insensitively.
    pub fn get_bullet(&self, guild_id: &str, channel_id: &str, name: &str) -> Result<TruthBullet> {
        let conn = self.conn.lock().unwrap();
        find_by_name(&conn, guild_id, channel_id, name)
    }

    pub fn rename_bullet(
        &self,
        guild_id: &str,
        channel_id: &str,
        name: &str,
        new_trigger: &str,
    ) -> Result<()> {
        validate_trigger(new_trigger)?;
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;

        // Re-validate uniqueness only if the name actually changed; renaming
        // a bullet to a different casing of itself is allowed.
        if bullet.trigger.to_lowercase() != new_trigger.to_lowercase() {
            let existing = channel_bullets(&conn, guild_id, channel_id)?;
            if namespace_conflict(&existing, new_trigger, Some(bullet.id)) {
                return Err(InvestigationError::AlreadyExists(new_trigger.to_string()));
            }
        }

        conn.execute(
            r#"UPDATE truth_bullets SET "trigger" = ?2 WHERE id = ?1"#,
            (bullet.id, new_trigger),
        )?;
        Ok(())
    }

    pub fn set_description(
        &self,
        guild_id: &str,
        channel_id: &str,
        name: &str,
        description: &str,
    ) -> Result<()> {
        validate_description(description)?;
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;
        conn.execute(
            "UPDATE truth_bullets SET description = ?2 WHERE id = ?1",
            (bullet.id, description),
        )?;
        Ok(())
    }

    pub fn set_image(
        &self,
        guild_id: &str,
        channel_id: &str,
        name: &str,
        image: Option<&str>,
    ) -> Result<()> {
        if let Some(image) = image {
            validate_image_url(image)?;
        }
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;
        conn.execute(
            "UPDATE truth_bullets SET image = ?2 WHERE id = ?1",
            (bullet.id, image),
        )?;
        Ok(())
    }

    pub fn set_hidden(
        &self,
        guild_id: &str,
        channel_id: &str,
        name: &str,
        hidden: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;
        conn.execute(
            "UPDATE truth_bullets SET hidden = ?2 WHERE id = ?1",
            (bullet.id, hidden),
        )?;
        Ok(())
    }

    pub fn delete_bullet(&self, guild_id: &str, channel_id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;
        conn.execute("DELETE FROM truth_bullets WHERE id = ?1", (bullet.id,))?;
        Ok(())
    }

    /// Removes every bullet in the guild. Returns how many were deleted.
    pub fn clear_guild_bullets(&self, guild_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM truth_bullets WHERE guild_id = ?1",
            (guild_id,),
        )?;
        Ok(count)
    }

    pub fn add_alias(
        &self,
        guild_id: &str,
        channel_id: &str,
        name: &str,
        alias: &str,
    ) -> Result<()> {
        validate_alias(alias)?;
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;
        if bullet.aliases.len() >= MAX_ALIASES {
            return Err(InvestigationError::TooManyAliases);
        }

        // The alias namespace includes every trigger and alias in the
        // channel, this bullet's own names included.
        let existing = channel_bullets(&conn, guild_id, channel_id)?;
        if namespace_conflict(&existing, alias, None) {
            return Err(InvestigationError::AlreadyExists(alias.to_string()));
        }

        let mut aliases = bullet.aliases;
        aliases.push(alias.to_string());
        write_aliases(&conn, bullet.id, &aliases)
    }

    pub fn remove_alias(
        &self,
        guild_id: &str,
        channel_id: &str,
        name: &str,
        alias: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;

        let lowered = alias.to_lowercase();
        let mut aliases = bullet.aliases;
        let before = aliases.len();
        aliases.retain(|a| a.to_lowercase() != lowered);
        if aliases.len() == before {
            return Err(InvestigationError::AliasNotFound(alias.to_string()));
        }
        write_aliases(&conn, bullet.id, &aliases)
    }

    /// Conditional claim: marks the bullet found by `finder` only if nobody
    /// got there first. Returns false when the row was already found, which
    /// a concurrent caller should treat as losing the race.
    pub fn mark_found(&self, bullet_id: i64, finder: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE truth_bullets
             SET found = 1, finder = ?2, found_at = datetime('now')
             WHERE id = ?1 AND found = 0",
            (bullet_id, finder),
        )?;
        Ok(affected == 1)
    }

    /// Administrative reset of a found bullet back to undiscovered.
    pub fn unfind_bullet(&self, guild_id: &str, channel_id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;
        if !bullet.found {
            return Err(InvestigationError::NotYetFound);
        }
        conn.execute(
            "UPDATE truth_bullets SET found = 0, finder = NULL, found_at = NULL WHERE id = ?1",
            (bullet.id,),
        )?;
        Ok(())
    }

    /// Administrative correction of who gets credit for a found bullet.
    pub fn override_finder(
        &self,
        guild_id: &str,
        channel_id: &str,
        name: &str,
        finder: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let bullet = find_by_name(&conn, guild_id, channel_id, name)?;
        if !bullet.found {
            return Err(InvestigationError::NotYetFound);
        }
        conn.execute(
            "UPDATE truth_bullets
             SET finder = ?2, found_at = COALESCE(found_at, datetime('now'))
             WHERE id = ?1",
            (bullet.id, finder),
        )?;
        Ok(())
    }

    pub fn any_unfound_in_guild(&self, guild_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .prepare("SELECT 1 FROM truth_bullets WHERE guild_id = ?1 AND found = 0 LIMIT 1")?
            .exists([guild_id])?;
        Ok(exists)
    }

    /// Found-bullet counts grouped by finder across the whole guild.
    pub fn finder_counts(&self, guild_id: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT finder, COUNT(*) FROM truth_bullets
             WHERE guild_id = ?1 AND found = 1 AND finder IS NOT NULL
             GROUP BY finder",
        )?;
        let rows = stmt.query_map([guild_id], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    // --- Guild configuration ---

    pub fn get_config(&self, guild_id: &str) -> Result<Option<GuildConfig>> {
        let conn = self.conn.lock().unwrap();
        let config = conn
            .prepare(
                "SELECT guild_id, player_role, bullets_enabled, bullet_channel_id,
                        best_finder_role, investigation_type, thread_behavior, show_best_finders
                 FROM investigation_configs WHERE guild_id = ?1",
            )?
            .query_row([guild_id], |row| {
                Ok(GuildConfig {
                    guild_id: row.get(0)?,
                    player_role: row.get(1)?,
                    bullets_enabled: row.get(2)?,
                    bullet_channel_id: row.get(3)?,
                    best_finder_role: row.get(4)?,
                    investigation_type: InvestigationType::from_db(row.get(5)?),
                    thread_behavior: ThreadBehavior::from_db(row.get(6)?),
                    show_best_finders: row.get(7)?,
                })
            })
            .optional()?;
        Ok(config)
    }

    pub fn upsert_config(&self, config: &GuildConfig) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO investigation_configs
                 (guild_id, player_role, bullets_enabled, bullet_channel_id,
                  best_finder_role, investigation_type, thread_behavior, show_best_finders)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(guild_id) DO UPDATE SET
                 player_role = ?2, bullets_enabled = ?3, bullet_channel_id = ?4,
                 best_finder_role = ?5, investigation_type = ?6, thread_behavior = ?7,
                 show_best_finders = ?8",
            (
                &config.guild_id,
                &config.player_role,
                config.bullets_enabled,
                &config.bullet_channel_id,
                &config.best_finder_role,
                config.investigation_type.as_db(),
                config.thread_behavior.as_db(),
                config.show_best_finders,
            ),
        )?;
        Ok(())
    }

    pub fn set_bullets_enabled(&self, guild_id: &str, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE investigation_configs SET bullets_enabled = ?2 WHERE guild_id = ?1",
            (guild_id, enabled),
        )?;
        Ok(())
    }

    /// Degrade path for an unreachable reveal channel: the game goes dark and
    /// the stale channel id is dropped.
    pub fn disable_and_clear_channel(&self, guild_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE investigation_configs
             SET bullets_enabled = 0, bullet_channel_id = NULL
             WHERE guild_id = ?1",
            (guild_id,),
        )?;
        Ok(())
    }

    /// Guild ids the message-scan hot path should watch, used to seed the
    /// in-memory cache at startup.
    pub fn active_guild_ids(&self) -> Result<Vec<u64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guild_id FROM investigation_configs
             WHERE bullets_enabled = 1 AND investigation_type != ?1",
        )?;
        let rows = stmt.query_map([InvestigationType::CommandOnly.as_db()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut ids = Vec::new();
        for row in rows {
            if let Ok(id) = row?.parse::<u64>() {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Drops everything the bot knows about a guild. Called when it leaves.
    pub fn purge_guild(&self, guild_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM truth_bullets WHERE guild_id = ?1", (guild_id,))?;
        conn.execute(
            "DELETE FROM investigation_configs WHERE guild_id = ?1",
            (guild_id,),
        )?;
        Ok(())
    }
}

fn row_to_bullet(row: &rusqlite::Row<'_>) -> rusqlite::Result<TruthBullet> {
    let aliases_json: String = row.get(4)?;
    // Rows written before aliases existed may hold junk; normalize anything
    // unparseable to the canonical empty list.
    let aliases = serde_json::from_str(&aliases_json).unwrap_or_default();
    Ok(TruthBullet {
        id: row.get(0)?,
        guild_id: row.get(1)?,
        channel_id: row.get(2)?,
        trigger: row.get(3)?,
        aliases,
        description: row.get(5)?,
        image: row.get(6)?,
        found: row.get(7)?,
        finder: row.get(8)?,
        found_at: row.get(9)?,
        hidden: row.get(10)?,
    })
}

fn channel_bullets(
    conn: &Connection,
    guild_id: &str,
    channel_id: &str,
) -> Result<Vec<TruthBullet>> {
    let mut stmt = conn.prepare(
        r#"SELECT id, guild_id, channel_id, "trigger", aliases, description, image,
                  found, finder, found_at, hidden
           FROM truth_bullets
           WHERE guild_id = ?1 AND channel_id = ?2
           ORDER BY id"#,
    )?;
    let rows = stmt.query_map((guild_id, channel_id), row_to_bullet)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn find_by_name(
    conn: &Connection,
    guild_id: &str,
    channel_id: &str,
    name: &str,
) -> Result<TruthBullet> {
    channel_bullets(conn, guild_id, channel_id)?
        .into_iter()
        .find(|b| b.matches_name(name))
        .ok_or_else(|| InvestigationError::NotFound(name.to_string()))
}

/// Whether `name` collides with any trigger or alias in the channel,
/// case-insensitively. `exclude_id` skips the bullet being renamed.
fn namespace_conflict(bullets: &[TruthBullet], name: &str, exclude_id: Option<i64>) -> bool {
    let lowered = name.to_lowercase();
    bullets
        .iter()
        .filter(|b| Some(b.id) != exclude_id)
        .flat_map(|b| b.names())
        .any(|n| n.to_lowercase() == lowered)
}

fn write_aliases(conn: &Connection, bullet_id: i64, aliases: &[String]) -> Result<()> {
    let json = serde_json::to_string(aliases)?;
    conn.execute(
        "UPDATE truth_bullets SET aliases = ?2 WHERE id = ?1",
        (bullet_id, json),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ALIAS_MAX_CHARS, TRIGGER_MAX_CHARS};

    fn test_db() -> Database {
        let db = Database::new(":memory:").unwrap();
        db.execute_init().unwrap();
        db
    }

    fn new_bullet(trigger: &str) -> NewBullet {
        NewBullet {
            guild_id: "g1".into(),
            channel_id: "c1".into(),
            trigger: trigger.into(),
            description: "a clue".into(),
            image: None,
            hidden: false,
        }
    }

    /// `finder` (and `found_at`) must be set exactly when `found` is true.
    fn assert_finder_invariant(db: &Database) {
        for bullet in db.list_bullets("g1", "c1").unwrap() {
            assert_eq!(bullet.found, bullet.finder.is_some(), "bullet {}", bullet.id);
            assert_eq!(bullet.found, bullet.found_at.is_some(), "bullet {}", bullet.id);
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let db = test_db();
        let id = db.create_bullet(&new_bullet("Knife")).unwrap();
        assert!(id > 0);

        let bullet = db.get_bullet("g1", "c1", "knife").unwrap();
        assert_eq!(bullet.trigger, "Knife");
        assert!(!bullet.found);
        assert!(bullet.aliases.is_empty());

        // Wrong channel is a miss.
        assert!(matches!(
            db.get_bullet("g1", "c2", "knife"),
            Err(InvestigationError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_triggers_rejected() {
        let db = test_db();
        db.create_bullet(&new_bullet("Knife")).unwrap();

        assert!(matches!(
            db.create_bullet(&new_bullet("KNIFE")),
            Err(InvestigationError::AlreadyExists(_))
        ));

        // Duplicate against an alias too.
        db.create_bullet(&new_bullet("Rope")).unwrap();
        db.add_alias("g1", "c1", "Rope", "cord").unwrap();
        assert!(matches!(
            db.create_bullet(&new_bullet("Cord")),
            Err(InvestigationError::AlreadyExists(_))
        ));

        // Same trigger in another channel is fine.
        let mut other = new_bullet("Knife");
        other.channel_id = "c2".into();
        assert!(db.create_bullet(&other).is_ok());
    }

    #[test]
    fn test_trigger_length_boundary() {
        let db = test_db();
        assert!(db
            .create_bullet(&new_bullet(&"x".repeat(TRIGGER_MAX_CHARS)))
            .is_ok());
        assert!(matches!(
            db.create_bullet(&new_bullet(&"y".repeat(TRIGGER_MAX_CHARS + 1))),
            Err(InvestigationError::TriggerTooLong)
        ));
    }

    #[test]
    fn test_alias_limits_and_round_trip() {
        let db = test_db();
        db.create_bullet(&new_bullet("Knife")).unwrap();

        db.add_alias("g1", "c1", "Knife", "a").unwrap();
        db.add_alias("g1", "c1", "Knife", "b").unwrap();

        // Round trip: remove "a", exactly {"b"} remains.
        db.remove_alias("g1", "c1", "Knife", "a").unwrap();
        let bullet = db.get_bullet("g1", "c1", "Knife").unwrap();
        assert_eq!(bullet.aliases, vec!["b".to_string()]);

        assert!(matches!(
            db.remove_alias("g1", "c1", "Knife", "a"),
            Err(InvestigationError::AliasNotFound(_))
        ));

        // Alias length boundary.
        assert!(db
            .add_alias("g1", "c1", "Knife", &"z".repeat(ALIAS_MAX_CHARS))
            .is_ok());
        assert!(matches!(
            db.add_alias("g1", "c1", "Knife", &"w".repeat(ALIAS_MAX_CHARS + 1)),
            Err(InvestigationError::AliasTooLong)
        ));

        // Fill to five, sixth rejected.
        db.add_alias("g1", "c1", "Knife", "c").unwrap();
        db.add_alias("g1", "c1", "Knife", "d").unwrap();
        db.add_alias("g1", "c1", "Knife", "e").unwrap();
        assert_eq!(db.get_bullet("g1", "c1", "Knife").unwrap().aliases.len(), 5);
        assert!(matches!(
            db.add_alias("g1", "c1", "Knife", "f"),
            Err(InvestigationError::TooManyAliases)
        ));

        // Duplicate alias against another bullet's alias.
        db.create_bullet(&new_bullet("Rope")).unwrap();
        assert!(matches!(
            db.add_alias("g1", "c1", "Rope", "B"),
            Err(InvestigationError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_rename_revalidates_uniqueness() {
        let db = test_db();
        db.create_bullet(&new_bullet("Knife")).unwrap();
        db.create_bullet(&new_bullet("Rope")).unwrap();

        assert!(matches!(
            db.rename_bullet("g1", "c1", "Knife", "rope"),
            Err(InvestigationError::AlreadyExists(_))
        ));

        // Re-casing the same bullet is not a conflict.
        db.rename_bullet("g1", "c1", "Knife", "KNIFE").unwrap();
        assert_eq!(db.get_bullet("g1", "c1", "knife").unwrap().trigger, "KNIFE");

        db.rename_bullet("g1", "c1", "KNIFE", "Dagger").unwrap();
        assert!(db.get_bullet("g1", "c1", "Knife").is_err());
        assert!(db.get_bullet("g1", "c1", "dagger").is_ok());
    }

    #[test]
    fn test_mark_found_first_writer_wins() {
        let db = test_db();
        let id = db.create_bullet(&new_bullet("Knife")).unwrap();

        assert!(db.mark_found(id, "u1").unwrap());
        // Second claim observes the lost race instead of overwriting.
        assert!(!db.mark_found(id, "u2").unwrap());

        let bullet = db.get_bullet("g1", "c1", "Knife").unwrap();
        assert!(bullet.found);
        assert_eq!(bullet.finder.as_deref(), Some("u1"));
        assert_finder_invariant(&db);
    }

    #[test]
    fn test_unfind_then_override_is_idempotent() {
        let db = test_db();
        let id = db.create_bullet(&new_bullet("Knife")).unwrap();
        db.mark_found(id, "u1").unwrap();

        // Override on a found bullet swaps credit without normal discovery.
        db.override_finder("g1", "c1", "Knife", "u2").unwrap();
        assert_eq!(
            db.get_bullet("g1", "c1", "Knife").unwrap().finder.as_deref(),
            Some("u2")
        );
        assert_finder_invariant(&db);

        // Un-find resets the full found state.
        db.unfind_bullet("g1", "c1", "Knife").unwrap();
        let bullet = db.get_bullet("g1", "c1", "Knife").unwrap();
        assert!(!bullet.found && bullet.finder.is_none());
        assert_finder_invariant(&db);

        // Overriding an unfound bullet is rejected...
        assert!(matches!(
            db.override_finder("g1", "c1", "Knife", "u1"),
            Err(InvestigationError::NotYetFound)
        ));
        // ...and so is un-finding it twice.
        assert!(matches!(
            db.unfind_bullet("g1", "c1", "Knife"),
            Err(InvestigationError::NotYetFound)
        ));

        // Claiming again with the original finder reproduces the original state.
        assert!(db.mark_found(id, "u1").unwrap());
        let bullet = db.get_bullet("g1", "c1", "Knife").unwrap();
        assert!(bullet.found);
        assert_eq!(bullet.finder.as_deref(), Some("u1"));
    }

    #[test]
    fn test_unfound_listing_and_guild_aggregates() {
        let db = test_db();
        let k = db.create_bullet(&new_bullet("Knife")).unwrap();
        let r = db.create_bullet(&new_bullet("Rope")).unwrap();

        assert_eq!(db.list_unfound_bullets("g1", "c1").unwrap().len(), 2);
        assert!(db.any_unfound_in_guild("g1").unwrap());

        db.mark_found(k, "u1").unwrap();
        assert_eq!(db.list_unfound_bullets("g1", "c1").unwrap().len(), 1);
        assert!(db.any_unfound_in_guild("g1").unwrap());

        db.mark_found(r, "u2").unwrap();
        assert!(!db.any_unfound_in_guild("g1").unwrap());

        let mut counts = db.finder_counts("g1").unwrap();
        counts.sort();
        assert_eq!(counts, vec![("u1".to_string(), 1), ("u2".to_string(), 1)]);
    }

    #[test]
    fn test_clear_and_purge() {
        let db = test_db();
        db.create_bullet(&new_bullet("Knife")).unwrap();
        let mut other = new_bullet("Rope");
        other.channel_id = "c2".into();
        db.create_bullet(&other).unwrap();

        assert_eq!(db.clear_guild_bullets("g1").unwrap(), 2);
        assert!(db.list_bullets("g1", "c1").unwrap().is_empty());

        let mut config = GuildConfig::new("g1".into());
        config.bullets_enabled = true;
        db.upsert_config(&config).unwrap();
        db.purge_guild("g1").unwrap();
        assert!(db.get_config("g1").unwrap().is_none());
    }

    #[test]
    fn test_config_round_trip_and_active_ids() {
        let db = test_db();
        assert!(db.get_config("100").unwrap().is_none());

        let mut config = GuildConfig::new("100".into());
        config.player_role = Some("9".into());
        config.bullet_channel_id = Some("8".into());
        config.bullets_enabled = true;
        db.upsert_config(&config).unwrap();
        assert_eq!(db.get_config("100").unwrap().unwrap(), config);

        // Command-only guilds stay off the hot path.
        let mut cmd_only = GuildConfig::new("200".into());
        cmd_only.bullets_enabled = true;
        cmd_only.investigation_type = InvestigationType::CommandOnly;
        db.upsert_config(&cmd_only).unwrap();

        assert_eq!(db.active_guild_ids().unwrap(), vec![100]);

        db.set_bullets_enabled("100", false).unwrap();
        assert!(db.active_guild_ids().unwrap().is_empty());
        assert!(!db.get_config("100").unwrap().unwrap().bullets_enabled);

        // Degrade path clears the reveal channel too.
        db.set_bullets_enabled("100", true).unwrap();
        db.disable_and_clear_channel("100").unwrap();
        let degraded = db.get_config("100").unwrap().unwrap();
        assert!(!degraded.bullets_enabled);
        assert!(degraded.bullet_channel_id.is_none());
        // The player role survives the degrade.
        assert_eq!(degraded.player_role.as_deref(), Some("9"));
    }
}
