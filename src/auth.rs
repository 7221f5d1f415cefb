use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Who is asking for a lifecycle transition.
///
/// Roles arrive as lowercase strings on the wire and in config; the transition
/// table authorizes moves per role. `Admin` is the back-office superuser and
/// is accepted wherever `Backoffice`/`Subadmin` are.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActorRole {
    Customer,
    Backoffice,
    Subadmin,
    Admin,
}

impl ActorRole {
    /// True for everyone working the back office side of the counter.
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            ActorRole::Backoffice | ActorRole::Subadmin | ActorRole::Admin
        )
    }
}
