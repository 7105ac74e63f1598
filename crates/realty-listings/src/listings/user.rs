use bson::Document;
use serde::{Deserialize, Serialize};

use crate::resources::Resource;
use crate::store::Collection;

/// Prospective buyer account. Email is unique across users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Users are always listed in full; any query parameters are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {}

pub struct Users;

impl Resource for Users {
    const COLLECTION: Collection = Collection::Users;
    const LABEL: &'static str = "User";
    const PATH: &'static str = "/api/users";

    type Create = NewUser;
    type Patch = UserPatch;
    type Query = UserQuery;

    fn filter(_query: &UserQuery) -> Document {
        Document::new()
    }
}
