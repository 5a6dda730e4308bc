// Copyright 2023 Remi Bernotavicius

use super::{id_type, Recipe, RecipeField};
use crate::error::{unknown, Result};
use crate::model::{changed, Input, Model, Unique};
use crate::query::{Field, FieldKind, Value, Where};
use crate::relation::HasMany;
use chrono::NaiveDateTime;
use diesel::QueryableByName;
use serde::Serialize;
use strum::{EnumIter, IntoStaticStr};

id_type!(UserId);

#[derive(QueryableByName, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::users)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    /// A bcrypt hash, never the plain password.
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn check_password(&self, password: &str) -> Result<bool> {
        verify_password(password, &self.password)
    }
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| unknown!("failed to hash password: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).map_err(|e| unknown!("failed to verify password: {e}"))
}

#[derive(Debug, Hash, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum UserField {
    Id,
    Email,
    Name,
    Password,
    CreatedAt,
    UpdatedAt,
}

impl Field for UserField {
    fn kind(self) -> FieldKind {
        match self {
            Self::Id => FieldKind::Int,
            Self::Email | Self::Name | Self::Password => FieldKind::Text,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn is_nullable(self) -> bool {
        self == Self::Name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserUnique {
    Id(UserId),
    Email(String),
}

impl Unique<User> for UserUnique {
    fn to_where(&self) -> Where<UserField> {
        match self {
            Self::Id(id) => Where::equals(UserField::Id, *id),
            Self::Email(email) => Where::equals(UserField::Email, email.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserCreate {
    pub email: String,
    pub name: Option<String>,
    pub password: String,
}

impl UserCreate {
    /// `password` must already be hashed, see [`hash_password`].
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            password: password.into(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Input<User> for UserCreate {
    fn assignments(&self) -> Vec<(UserField, Value)> {
        vec![
            (UserField::Email, self.email.clone().into()),
            (UserField::Name, self.name.clone().into()),
            (UserField::Password, self.password.clone().into()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<Option<String>>,
    pub password: Option<String>,
}

impl Input<User> for UserUpdate {
    fn assignments(&self) -> Vec<(UserField, Value)> {
        let mut out = vec![];
        changed(&mut out, UserField::Email, &self.email);
        changed(&mut out, UserField::Name, &self.name);
        changed(&mut out, UserField::Password, &self.password);
        out
    }
}

impl Model for User {
    const NAME: &'static str = "User";
    const TABLE: &'static str = "users";
    const ID: UserField = UserField::Id;
    const CREATED_AT: UserField = UserField::CreatedAt;
    const UPDATED_AT: UserField = UserField::UpdatedAt;

    type Field = UserField;
    type Unique = UserUnique;
    type Create = UserCreate;
    type Update = UserUpdate;

    fn id(&self) -> i32 {
        self.id.get()
    }

    fn get(&self, field: UserField) -> Value {
        match field {
            UserField::Id => self.id.into(),
            UserField::Email => self.email.clone().into(),
            UserField::Name => self.name.clone().into(),
            UserField::Password => self.password.clone().into(),
            UserField::CreatedAt => self.created_at.into(),
            UserField::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl User {
    pub const RECIPES: HasMany<User, Recipe> = HasMany::new("recipes", RecipeField::UserId);
}

#[test]
fn passwords_are_hashed() {
    let hash = hash_password("hunter2", 4).unwrap();
    assert_ne!(hash, "hunter2");
    assert!(verify_password("hunter2", &hash).unwrap());
    assert!(!verify_password("hunter3", &hash).unwrap());
}
