//! User Storage
//! Mission: Credential Store for identities and their role-shaped profiles (SQLite)

use crate::auth::models::{
    AdminProfile, ParentProfile, Profile, Role, StudentProfile, TeacherProfile, User,
};
use crate::auth::password::{hash_password, MIN_PRODUCTION_COST};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use tracing::{info, warn};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at";

/// Identity + profile storage with SQLite backend
pub struct UserStore {
    db_path: String,
    bcrypt_cost: u32,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
            bcrypt_cost: MIN_PRODUCTION_COST,
        };
        store.init_db()?;
        Ok(store)
    }

    /// Override the bcrypt work factor used for new password hashes
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open auth database at {}", self.db_path))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS admin_profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id),
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS teacher_profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id),
                name TEXT NOT NULL,
                surname TEXT NOT NULL,
                email TEXT,
                phone TEXT
            );
            CREATE TABLE IF NOT EXISTS student_profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id),
                name TEXT NOT NULL,
                surname TEXT NOT NULL,
                grade INTEGER,
                class_name TEXT
            );
            CREATE TABLE IF NOT EXISTS parent_profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id),
                name TEXT NOT NULL,
                surname TEXT NOT NULL,
                phone TEXT
            );",
        )
        .context("Failed to initialize user tables")?;

        Ok(())
    }

    /// Seed an admin identity on first boot. Does nothing once any admin exists.
    pub fn ensure_bootstrap_admin(&self, username: &str, password: &str) -> Result<Option<User>> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?1",
                params![Role::Admin.as_str()],
                |row| row.get(0),
            )
            .context("Failed to check for admin users")?;

        if count > 0 {
            return Ok(None);
        }

        let admin = self.create_user(
            username,
            password,
            Profile::Admin(AdminProfile {
                name: "Administrator".to_string(),
            }),
        )?;

        info!("🔐 Bootstrap admin created (username: {})", admin.username);
        warn!("⚠️  Rotate the bootstrap admin password after first sign-in");

        Ok(Some(admin))
    }

    /// Create a new identity. The role is taken from the profile variant.
    pub fn create_user(&self, username: &str, password: &str, profile: Profile) -> Result<User> {
        let password_hash = hash_password(password, self.bcrypt_cost)?;

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            role: profile.role(),
            created_at: Utc::now().to_rfc3339(),
        };

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (id, username, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                user.role.as_str(),
                user.created_at,
            ],
        )
        .with_context(|| format!("Failed to insert user {}", user.username))?;
        insert_profile(&tx, &user.id, &profile)?;
        tx.commit()?;

        info!("✅ Created user: {} ({})", user.username, user.role);

        Ok(user)
    }

    /// Get user by username
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        conn.query_row(&sql, params![username], user_from_row)
            .optional()
            .context("Failed to look up user by username")
    }

    /// Get user by id
    pub fn get_user_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        conn.query_row(&sql, params![user_id.to_string()], user_from_row)
            .optional()
            .context("Failed to look up user by id")
    }

    /// Resolve the profile that belongs to the user's role
    pub fn get_profile(&self, user: &User) -> Result<Option<Profile>> {
        let conn = self.connect()?;
        let id = user.id.to_string();

        let profile = match user.role {
            Role::Admin => conn
                .query_row(
                    "SELECT name FROM admin_profiles WHERE user_id = ?1",
                    params![id],
                    |row| Ok(Profile::Admin(AdminProfile { name: row.get(0)? })),
                )
                .optional(),
            Role::Teacher => conn
                .query_row(
                    "SELECT name, surname, email, phone FROM teacher_profiles WHERE user_id = ?1",
                    params![id],
                    |row| {
                        Ok(Profile::Teacher(TeacherProfile {
                            name: row.get(0)?,
                            surname: row.get(1)?,
                            email: row.get(2)?,
                            phone: row.get(3)?,
                        }))
                    },
                )
                .optional(),
            Role::Student => conn
                .query_row(
                    "SELECT name, surname, grade, class_name FROM student_profiles WHERE user_id = ?1",
                    params![id],
                    |row| {
                        Ok(Profile::Student(StudentProfile {
                            name: row.get(0)?,
                            surname: row.get(1)?,
                            grade: row.get(2)?,
                            class_name: row.get(3)?,
                        }))
                    },
                )
                .optional(),
            Role::Parent => conn
                .query_row(
                    "SELECT name, surname, phone FROM parent_profiles WHERE user_id = ?1",
                    params![id],
                    |row| {
                        Ok(Profile::Parent(ParentProfile {
                            name: row.get(0)?,
                            surname: row.get(1)?,
                            phone: row.get(2)?,
                        }))
                    },
                )
                .optional(),
        };

        profile.with_context(|| format!("Failed to load {} profile for {}", user.role, user.id))
    }

    /// List all users (admin only)
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let mut stmt = conn.prepare(&sql)?;

        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Delete a user and its profile (admin only)
    pub fn delete_user(&self, user_id: &Uuid) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let id = user_id.to_string();

        for table in [
            "admin_profiles",
            "teacher_profiles",
            "student_profiles",
            "parent_profiles",
        ] {
            tx.execute(&format!("DELETE FROM {table} WHERE user_id = ?1"), params![id])?;
        }
        let rows_affected = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;

        if rows_affected == 0 {
            anyhow::bail!("User not found");
        }
        tx.commit()?;

        info!("🗑️  Deleted user: {}", user_id);
        Ok(())
    }
}

fn insert_profile(conn: &Connection, user_id: &Uuid, profile: &Profile) -> Result<()> {
    let id = user_id.to_string();
    match profile {
        Profile::Admin(p) => conn.execute(
            "INSERT INTO admin_profiles (user_id, name) VALUES (?1, ?2)",
            params![id, p.name],
        ),
        Profile::Teacher(p) => conn.execute(
            "INSERT INTO teacher_profiles (user_id, name, surname, email, phone)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, p.name, p.surname, p.email, p.phone],
        ),
        Profile::Student(p) => conn.execute(
            "INSERT INTO student_profiles (user_id, name, surname, grade, class_name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, p.name, p.surname, p.grade, p.class_name],
        ),
        Profile::Parent(p) => conn.execute(
            "INSERT INTO parent_profiles (user_id, name, surname, phone)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, p.name, p.surname, p.phone],
        ),
    }
    .with_context(|| format!("Failed to insert {} profile", profile.role()))?;
    Ok(())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(3)?;

    Ok(User {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: Role::parse(&role).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Text,
                format!("unknown role {role:?}").into(),
            )
        })?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use tempfile::NamedTempFile;

    pub(crate) fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path).unwrap().with_bcrypt_cost(4);
        (store, temp_file)
    }

    fn teacher_profile() -> Profile {
        Profile::Teacher(TeacherProfile {
            name: "Maria".to_string(),
            surname: "Montessori".to_string(),
            email: Some("maria@school.test".to_string()),
            phone: None,
        })
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let teacher = store
            .create_user("mmontessori", "password123", teacher_profile())
            .unwrap();
        assert_eq!(teacher.role, Role::Teacher);

        let by_name = store.get_user_by_username("mmontessori").unwrap().unwrap();
        assert_eq!(by_name.id, teacher.id);
        assert_eq!(by_name.role, Role::Teacher);
        assert!(verify_password("password123", &by_name.password_hash));

        let by_id = store.get_user_by_id(&teacher.id).unwrap().unwrap();
        assert_eq!(by_id.username, "mmontessori");

        assert!(store.get_user_by_username("nobody").unwrap().is_none());
        assert!(store.get_user_by_id(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_profile_matches_role() {
        let (store, _temp) = create_test_store();

        let student = store
            .create_user(
                "kid1",
                "pass",
                Profile::Student(StudentProfile {
                    name: "Tom".to_string(),
                    surname: "Sawyer".to_string(),
                    grade: Some(5),
                    class_name: Some("5A".to_string()),
                }),
            )
            .unwrap();

        let profile = store.get_profile(&student).unwrap().unwrap();
        assert_eq!(profile.role(), student.role);
        match profile {
            Profile::Student(p) => {
                assert_eq!(p.surname, "Sawyer");
                assert_eq!(p.grade, Some(5));
            }
            other => panic!("expected student profile, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (store, _temp) = create_test_store();

        store.create_user("dup", "pass", teacher_profile()).unwrap();
        let result = store.create_user(
            "dup",
            "pass",
            Profile::Parent(ParentProfile {
                name: "P".to_string(),
                surname: "Q".to_string(),
                phone: None,
            }),
        );
        assert!(result.is_err());

        // The failed insert must not leave an orphan profile behind
        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Teacher);
    }

    #[test]
    fn test_bootstrap_admin_only_once() {
        let (store, _temp) = create_test_store();

        let admin = store.ensure_bootstrap_admin("root", "rootpass").unwrap();
        assert!(admin.is_some());
        assert!(store.ensure_bootstrap_admin("root2", "x").unwrap().is_none());

        let admin = store.get_user_by_username("root").unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(matches!(
            store.get_profile(&admin).unwrap(),
            Some(Profile::Admin(_))
        ));
    }

    #[test]
    fn test_unknown_stored_role_is_an_error() {
        let (store, temp) = create_test_store();
        let conn = Connection::open(temp.path()).unwrap();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, role, created_at)
             VALUES (?1, 'ghost', 'x', 'JANITOR', 'now')",
            params![Uuid::new_v4().to_string()],
        )
        .unwrap();

        assert!(store.get_user_by_username("ghost").is_err());
    }

    #[test]
    fn test_delete_user() {
        let (store, _temp) = create_test_store();

        let user = store.create_user("temp", "pass", teacher_profile()).unwrap();
        store.delete_user(&user.id).unwrap();

        assert!(store.get_user_by_username("temp").unwrap().is_none());
        assert!(store.get_profile(&user).unwrap().is_none());
        assert!(store.delete_user(&user.id).is_err());
    }
}
