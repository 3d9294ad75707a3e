use super::schema::Database;
use super::types::{DatabaseError, User};

impl Database {
    /// Create an owner record, returning its id.
    ///
    /// Names are unique; registering an existing name is an error.
    pub async fn create_user(&self, name: &str) -> Result<i64, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO users (name, created_at, updated_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_user_by_name(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Every user, by name
    pub async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        let id = db.create_user("alice").await.unwrap();

        let user = db.get_user_by_name("alice").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name, "alice");
        assert!(db.get_user_by_name("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_user_name_rejected() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        db.create_user("alice").await.unwrap();
        assert!(db.create_user("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_list_users_sorted_by_name() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        assert!(db.list_users().await.unwrap().is_empty());
        db.create_user("carol").await.unwrap();
        db.create_user("alice").await.unwrap();

        let names: Vec<String> = db
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }
}
