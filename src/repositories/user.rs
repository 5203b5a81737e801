//! UserRepository - Repository per la gestione degli utenti

use super::{Create, Delete, Read, ReadMany, Update, like_contains, like_prefix};
use crate::dtos::{CreateUserDTO, UpdateUserDTO, is_custom_voice};
use crate::entities::{User, UserWithStats, VoiceMapping};
use chrono::{DateTime, Utc};
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};

pub(crate) const USER_COLUMNS: &str = "user_id, username, name, phone_number, email, password, \
     bio, website, profile_photo, cover_photo, punked, tts_voice_id, ape_balance, \
     wallet_address, wallet_created_at, last_activity_at, created_at";

const VOICE_MAPPING_COLUMNS: &str = "user_id, username, name, phone_number, profile_photo, \
     tts_voice_id, tts_remaining_trainings, punked, wallet_created_at";

/// Training TTS concessi a un utente senza voce personalizzata
pub const DEFAULT_TTS_TRAININGS: i64 = 5;

/// Filtri per la lista utenti
#[derive(Debug, Default, Clone)]
pub struct UserFilter {
    pub search: Option<String>,
    pub followers_of: Option<i32>,
    pub following_of: Option<i32>,
}

// USER REPO
pub struct UserRepository {
    connection_pool: SqlitePool,
}

impl UserRepository {
    pub fn new(connection_pool: SqlitePool) -> UserRepository {
        Self { connection_pool }
    }

    /// SELECT dell'utente con i contatori social visti da `viewer_id`
    fn stats_select(viewer_id: i32) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(
            "SELECT u.user_id, u.username, u.name, u.phone_number, u.email, u.password, \
             u.bio, u.website, u.profile_photo, u.cover_photo, u.punked, u.tts_voice_id, \
             u.ape_balance, u.wallet_address, u.wallet_created_at, u.last_activity_at, u.created_at, \
             (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.user_id) AS follower_count, \
             (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.user_id) AS following_count, \
             EXISTS(SELECT 1 FROM follows f WHERE f.follower_id = ",
        );
        qb.push_bind(viewer_id);
        qb.push(" AND f.following_id = u.user_id) AS is_following FROM users u");
        qb
    }

    /// Username univoco, confronto esatto
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// `phone` deve essere già normalizzato
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {} FROM users WHERE phone_number = ?", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(phone)
            .fetch_optional(&self.connection_pool)
            .await
    }

    pub async fn find_with_stats(
        &self,
        user_id: i32,
        viewer_id: i32,
    ) -> Result<Option<UserWithStats>, Error> {
        let mut qb = Self::stats_select(viewer_id);
        qb.push(" WHERE u.user_id = ");
        qb.push_bind(user_id);
        qb.build_query_as::<UserWithStats>()
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Lista utenti per la ricerca e per le liste follower/seguiti.
    /// Chi guarda è sempre escluso dal risultato.
    pub async fn search(
        &self,
        viewer_id: i32,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserWithStats>, Error> {
        let mut qb = Self::stats_select(viewer_id);
        qb.push(" WHERE u.user_id != ");
        qb.push_bind(viewer_id);

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND (LOWER(u.username) LIKE ");
            qb.push_bind(like_prefix(&search.to_lowercase()));
            qb.push(" ESCAPE '\\' OR LOWER(COALESCE(u.name, '')) LIKE ");
            qb.push_bind(like_contains(&search.to_lowercase()));
            qb.push(" ESCAPE '\\')");
        }
        if let Some(target) = filter.followers_of {
            qb.push(" AND u.user_id IN (SELECT follower_id FROM follows WHERE following_id = ");
            qb.push_bind(target);
            qb.push(")");
        }
        if let Some(target) = filter.following_of {
            qb.push(" AND u.user_id IN (SELECT following_id FROM follows WHERE follower_id = ");
            qb.push_bind(target);
            qb.push(")");
        }

        qb.push(" ORDER BY u.user_id ASC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        qb.build_query_as::<UserWithStats>()
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Follower di `user_id` con la modalità punk attiva
    pub async fn find_punked_followers(&self, user_id: i32) -> Result<Vec<User>, Error> {
        let sql = format!(
            "SELECT {} FROM users u JOIN follows f ON f.follower_id = u.user_id \
             WHERE f.following_id = ? AND u.punked = 1 ORDER BY f.created_at DESC",
            prefixed_columns("u")
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
    }

    pub async fn touch_activity(&self, user_id: i32, at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query("UPDATE users SET last_activity_at = ? WHERE user_id = ?")
            .bind(at)
            .bind(user_id)
            .execute(&self.connection_pool)
            .await?;
        Ok(())
    }

    fn push_admin_filters(
        qb: &mut QueryBuilder<'_, Sqlite>,
        search: Option<&str>,
        has_voice: Option<bool>,
    ) {
        qb.push(" WHERE 1 = 1");
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_contains(&search.to_lowercase());
            qb.push(" AND (LOWER(username) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR LOWER(COALESCE(name, '')) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR COALESCE(phone_number, '') LIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }
        match has_voice {
            Some(true) => {
                qb.push(" AND tts_voice_id IS NOT NULL AND tts_voice_id != ''");
            }
            Some(false) => {
                qb.push(" AND (tts_voice_id IS NULL OR tts_voice_id = '')");
            }
            None => {}
        }
    }

    /// Lista del backoffice: prima chi ha una voce configurata, poi i più recenti
    pub async fn admin_list(
        &self,
        search: Option<&str>,
        has_voice: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), Error> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
        Self::push_admin_filters(&mut count_qb, search, has_voice);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        Self::push_admin_filters(&mut qb, search, has_voice);
        qb.push(
            " ORDER BY (tts_voice_id IS NOT NULL AND tts_voice_id != '') DESC, \
             created_at DESC, user_id DESC LIMIT ",
        );
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);
        let users = qb
            .build_query_as::<User>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((users, total))
    }
}

// ************************* PASSWORD E VOCI ************************* //

impl UserRepository {
    /// `password_hash` è già hashata
    pub async fn set_password(&self, user_id: i32, password_hash: &str) -> Result<bool, Error> {
        let result = sqlx::query("UPDATE users SET password = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_voice_mapping(&self, user_id: i32) -> Result<Option<VoiceMapping>, Error> {
        let sql = format!(
            "SELECT {} FROM users WHERE user_id = ?",
            VOICE_MAPPING_COLUMNS
        );
        sqlx::query_as::<_, VoiceMapping>(&sql)
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Stessi filtri della lista admin; prima chi ha una voce, poi gli id più recenti
    pub async fn voice_mappings(
        &self,
        search: Option<&str>,
        has_voice: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<VoiceMapping>, i64), Error> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
        Self::push_admin_filters(&mut count_qb, search, has_voice);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM users",
            VOICE_MAPPING_COLUMNS
        ));
        Self::push_admin_filters(&mut qb, search, has_voice);
        qb.push(" ORDER BY (tts_voice_id IS NOT NULL AND tts_voice_id != '') DESC, user_id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);
        let mappings = qb
            .build_query_as::<VoiceMapping>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((mappings, total))
    }

    /// `voice`: `Some(None)` rimuove la voce, `None` la lascia invariata.
    /// Una voce personalizzata (`S_...`) rende l'utente punked.
    pub async fn update_voice_mapping(
        &self,
        user_id: i32,
        voice: Option<Option<&str>>,
        remaining_trainings: Option<i64>,
    ) -> Result<Option<VoiceMapping>, Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE users SET user_id = user_id");
        if let Some(voice) = voice {
            qb.push(", tts_voice_id = ");
            qb.push_bind(voice.map(str::to_string));
            qb.push(", punked = ");
            qb.push_bind(voice.is_some_and(is_custom_voice));
        }
        if let Some(remaining) = remaining_trainings {
            qb.push(", tts_remaining_trainings = ");
            qb.push_bind(remaining);
        }
        qb.push(" WHERE user_id = ");
        qb.push_bind(user_id);
        let result = qb.build().execute(&self.connection_pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_voice_mapping(user_id).await
    }

    /// Aggiornamento in blocco: un utente mancante annulla tutto con `RowNotFound`
    pub async fn batch_voice_mappings(&self, mappings: &[(i32, Option<String>)]) -> Result<u64, Error> {
        let mut tx = self.connection_pool.begin().await?;
        for (user_id, voice) in mappings {
            let result =
                sqlx::query("UPDATE users SET tts_voice_id = ?, punked = ? WHERE user_id = ?")
                    .bind(voice)
                    .bind(voice.as_deref().is_some_and(is_custom_voice))
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(Error::RowNotFound);
            }
        }
        tx.commit().await?;
        Ok(mappings.len() as u64)
    }

    /// Nessuna voce, non punked, training riportati al valore iniziale
    pub async fn clear_voice_mapping(&self, user_id: i32) -> Result<Option<VoiceMapping>, Error> {
        let result = sqlx::query(
            "UPDATE users SET tts_voice_id = NULL, punked = 0, tts_remaining_trainings = ? \
             WHERE user_id = ?",
        )
        .bind(DEFAULT_TTS_TRAININGS)
        .bind(user_id)
        .execute(&self.connection_pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_voice_mapping(user_id).await
    }
}

/// Colonne utente qualificate con l'alias di tabella
pub(crate) fn prefixed_columns(alias: &str) -> String {
    USER_COLUMNS
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Create<User, CreateUserDTO> for UserRepository {
    async fn create(&self, data: &CreateUserDTO) -> Result<User, Error> {
        let sql = format!(
            "INSERT INTO users (username, name, phone_number, email, password, tts_voice_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&data.username)
            .bind(&data.name)
            .bind(&data.phone_number)
            .bind(&data.email)
            .bind(&data.password)
            .bind(&data.tts_voice_id)
            .bind(Utc::now())
            .fetch_one(&self.connection_pool)
            .await
    }
}

impl Read<User, i32> for UserRepository {
    async fn read(&self, id: &i32) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {} FROM users WHERE user_id = ?", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl ReadMany<User, i32> for UserRepository {
    async fn read_many(&self, ids: &[i32]) -> Result<Vec<User>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users WHERE user_id IN (", USER_COLUMNS));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        qb.build_query_as::<User>()
            .fetch_all(&self.connection_pool)
            .await
    }
}

impl Update<User, UpdateUserDTO, i32> for UserRepository {
    async fn update(&self, id: &i32, data: &UpdateUserDTO) -> Result<User, Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        let mut fields = qb.separated(", ");
        let mut touched = false;

        macro_rules! set_field {
            ($column:literal, $value:expr) => {
                if let Some(value) = $value {
                    fields.push(concat!($column, " = "));
                    fields.push_bind_unseparated(value.clone());
                    touched = true;
                }
            };
        }

        set_field!("username", &data.username);
        set_field!("name", &data.name);
        set_field!("email", &data.email);
        set_field!("bio", &data.bio);
        set_field!("website", &data.website);
        set_field!("profile_photo", &data.profile_photo);
        set_field!("cover_photo", &data.cover_photo);
        set_field!("tts_voice_id", &data.tts_voice_id);
        set_field!("punked", &data.punked);

        if touched {
            qb.push(" WHERE user_id = ");
            qb.push_bind(*id);
            let result = qb.build().execute(&self.connection_pool).await?;
            if result.rows_affected() == 0 {
                return Err(Error::RowNotFound);
            }
        }

        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<i32> for UserRepository {
    async fn delete(&self, user_id: &i32) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "follows")))]
    async fn test_find_with_stats(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);

        let alice = repo.find_with_stats(1, 2).await?.expect("alice exists");
        assert_eq!(alice.user.username, "alice");
        assert_eq!(alice.follower_count, 2);
        assert_eq!(alice.following_count, 1);
        assert!(alice.is_following, "bob follows alice");

        let alice_seen_by_admin = repo.find_with_stats(1, 4).await?.expect("alice exists");
        assert!(!alice_seen_by_admin.is_following);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "follows")))]
    async fn test_search_excludes_viewer(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);

        let filter = UserFilter {
            search: Some("AL".into()),
            ..Default::default()
        };
        let found = repo.search(2, &filter, 10, 0).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user.username, "alice");

        let found = repo.search(1, &filter, 10, 0).await?;
        assert!(found.is_empty());
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "follows")))]
    async fn test_followers_filter(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);

        let filter = UserFilter {
            followers_of: Some(1),
            ..Default::default()
        };
        let followers = repo.search(4, &filter, 10, 0).await?;
        let ids: Vec<i32> = followers.iter().map(|u| u.user.user_id).collect();
        assert_eq!(ids, vec![2, 3]);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_partial_update(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);

        let data = UpdateUserDTO {
            bio: Some("nuova bio".into()),
            punked: Some(true),
            ..Default::default()
        };
        let updated = repo.update(&1, &data).await?;
        assert_eq!(updated.bio.as_deref(), Some("nuova bio"));
        assert!(updated.punked);
        assert_eq!(updated.name.as_deref(), Some("Alice"));

        let missing = repo.update(&999, &data).await;
        assert!(matches!(missing, Err(Error::RowNotFound)));
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_voice_mapping_updates(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);

        let alice = repo
            .update_voice_mapping(1, Some(Some("S_alice")), Some(2))
            .await?
            .expect("alice exists");
        assert_eq!(alice.tts_voice_id.as_deref(), Some("S_alice"));
        assert!(alice.punked);
        assert_eq!(alice.tts_remaining_trainings, 2);

        // voce standard: non punked, training invariati
        let alice = repo
            .update_voice_mapping(1, Some(Some("BV001")), None)
            .await?
            .expect("alice exists");
        assert!(!alice.punked);
        assert_eq!(alice.tts_remaining_trainings, 2);

        let cleared = repo.clear_voice_mapping(1).await?.expect("alice exists");
        assert!(cleared.tts_voice_id.is_none());
        assert_eq!(cleared.tts_remaining_trainings, DEFAULT_TTS_TRAININGS);

        assert!(repo.update_voice_mapping(999, None, Some(1)).await?.is_none());
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_batch_voice_mappings_is_atomic(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);

        let result = repo
            .batch_voice_mappings(&[(1, Some("S_x".into())), (999, Some("S_y".into()))])
            .await;
        assert!(matches!(result, Err(Error::RowNotFound)));
        let alice = repo.find_voice_mapping(1).await?.expect("alice exists");
        assert!(alice.tts_voice_id.is_none());

        let updated = repo
            .batch_voice_mappings(&[(1, Some("S_x".into())), (2, None)])
            .await?;
        assert_eq!(updated, 2);
        let bob = repo.find_voice_mapping(2).await?.expect("bob exists");
        assert!(bob.tts_voice_id.is_none());
        assert!(!bob.punked);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_admin_list_voice_first(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);

        let (users, total) = repo.admin_list(None, None, 50, 0).await?;
        assert_eq!(total, 4);
        assert_eq!(users[0].username, "bob");

        let (users, total) = repo.admin_list(None, Some(true), 50, 0).await?;
        assert_eq!(total, 1);
        assert_eq!(users.len(), 1);
        Ok(())
    }
}
