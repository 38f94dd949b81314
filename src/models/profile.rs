//! Uploader profiles for the points/rewards layer.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user profile row. Points accrue when uploads are accepted and are
/// only ever added to from this service.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Profile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub points: i64,
}
