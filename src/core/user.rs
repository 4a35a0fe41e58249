//! User lookups - resolving callers and loan owners.
//!
//! The ledger never registers or authenticates users. It reads them to turn an
//! [`Identity`] into a stored user and to find who owns a loan, and it can seed
//! the users listed in config.toml.

use crate::{
    config::users::UserConfig,
    core::identity::Identity,
    entities::{User, user},
    errors::{EntityKind, Error, Result},
};
use sea_orm::{Set, prelude::*, sea_query::Expr};
use tracing::info;

/// Finds a user by primary key.
pub async fn get_user_by_id<C>(db: &C, user_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by login email.
pub async fn get_user_by_email<C>(db: &C, email: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads the stored user behind an authenticated identity.
///
/// The identity's email is the authenticated principal, so the lookup goes
/// through it rather than trusting the id alone.
pub async fn resolve_caller<C>(db: &C, caller: &Identity) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user_by_email(db, &caller.email)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::User, &caller.email))
}

/// Takes the write lock on a user row by rewriting its role to itself.
///
/// Serializes loan applications by the same borrower.
pub(crate) async fn lock_user_row<C>(db: &C, user_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = User::update_many()
        .col_expr(user::Column::Role, Expr::col(user::Column::Role).into())
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found(EntityKind::User, user_id));
    }
    Ok(())
}

/// Inserts a user row.
pub async fn create_user<C>(db: &C, config: &UserConfig) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let email = config.email.trim();
    if email.is_empty() {
        return Err(Error::Config {
            message: "User email cannot be empty".to_string(),
        });
    }

    let user = user::ActiveModel {
        email: Set(email.to_string()),
        first_name: Set(config.first_name.clone()),
        last_name: Set(config.last_name.clone()),
        role: Set(config.role),
        ..Default::default()
    };

    user.insert(db).await.map_err(Into::into)
}

/// Inserts every configured user whose email is not stored yet.
///
/// Returns the number of users inserted.
pub async fn seed_users(db: &DatabaseConnection, users: &[UserConfig]) -> Result<usize> {
    let mut inserted = 0;
    for config in users {
        if get_user_by_email(db, config.email.trim()).await?.is_some() {
            continue;
        }
        let user = create_user(db, config).await?;
        info!("Seeded {} user {} (id {})", user.role, user.email, user.id);
        inserted += 1;
    }
    Ok(inserted)
}
