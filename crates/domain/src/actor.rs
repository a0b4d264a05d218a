use std::fmt::{Display, Formatter};
use std::str::FromStr;

use grantry_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64")]
pub struct UserId(i64);

impl UserId {
    /// Creates a user identifier, rejecting non-positive values.
    pub fn new(value: i64) -> AppResult<Self> {
        positive_id("user id", value).map(Self)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for UserId {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64")]
pub struct TeamId(i64);

impl TeamId {
    /// Creates a team identifier, rejecting non-positive values.
    pub fn new(value: i64) -> AppResult<Self> {
        positive_id("team id", value).map(Self)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TeamId {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for TeamId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

fn positive_id(label: &str, value: i64) -> AppResult<i64> {
    if value <= 0 {
        return Err(AppError::Validation(format!(
            "{label} must be positive, got {value}"
        )));
    }

    Ok(value)
}

/// Default roles every organization member implicitly holds.
///
/// Serialized as its storage value, e.g. `"Server Admin"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuiltinRole {
    /// Read-only organization member.
    Viewer,
    /// Member allowed to edit organization content.
    Editor,
    /// Organization administrator.
    Admin,
    /// Server-wide administrator.
    ServerAdmin,
}

impl BuiltinRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "Viewer",
            Self::Editor => "Editor",
            Self::Admin => "Admin",
            Self::ServerAdmin => "Server Admin",
        }
    }

    /// Returns all known builtin roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[BuiltinRole] = &[
            BuiltinRole::Viewer,
            BuiltinRole::Editor,
            BuiltinRole::Admin,
            BuiltinRole::ServerAdmin,
        ];

        ALL
    }

    /// Returns the lower-case slug used in managed role names.
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
            Self::ServerAdmin => "server_admin",
        }
    }
}

impl Display for BuiltinRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for BuiltinRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Viewer" => Ok(Self::Viewer),
            "Editor" => Ok(Self::Editor),
            "Admin" => Ok(Self::Admin),
            // Grafana-compatible callers name the server-wide role this way.
            "Server Admin" | "Grafana Admin" => Ok(Self::ServerAdmin),
            _ => Err(AppError::Validation(format!(
                "unknown builtin role '{value}'"
            ))),
        }
    }
}

impl TryFrom<String> for BuiltinRole {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl From<BuiltinRole> for String {
    fn from(role: BuiltinRole) -> Self {
        role.as_str().to_owned()
    }
}

/// Kind of actor a managed role is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// Individual user.
    User,
    /// Team of users.
    Team,
    /// Builtin organization role.
    BuiltinRole,
}

impl ActorKind {
    /// Returns the plural segment used in managed role names.
    #[must_use]
    pub fn plural(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Team => "teams",
            Self::BuiltinRole => "builtins",
        }
    }
}

/// Reference to exactly one actor that can hold permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ActorRef {
    /// A single user.
    User(UserId),
    /// A team.
    Team(TeamId),
    /// A builtin organization role.
    BuiltinRole(BuiltinRole),
}

impl ActorRef {
    /// Builds an actor from a transport shape carrying three optional references.
    ///
    /// Exactly one of the references must be supplied.
    pub fn from_parts(
        user_id: Option<i64>,
        team_id: Option<i64>,
        builtin_role: Option<&str>,
    ) -> AppResult<Self> {
        match (user_id, team_id, builtin_role) {
            (Some(user_id), None, None) => UserId::new(user_id).map(Self::User),
            (None, Some(team_id), None) => TeamId::new(team_id).map(Self::Team),
            (None, None, Some(builtin_role)) => {
                BuiltinRole::from_str(builtin_role).map(Self::BuiltinRole)
            }
            (None, None, None) => Err(AppError::Validation(
                "actor reference must name a user, a team or a builtin role".to_owned(),
            )),
            _ => Err(AppError::Validation(
                "actor reference must name exactly one of user, team or builtin role".to_owned(),
            )),
        }
    }

    /// Returns the actor kind.
    #[must_use]
    pub fn kind(&self) -> ActorKind {
        match self {
            Self::User(_) => ActorKind::User,
            Self::Team(_) => ActorKind::Team,
            Self::BuiltinRole(_) => ActorKind::BuiltinRole,
        }
    }

    /// Returns the user id when the actor is a user.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(user_id) => Some(*user_id),
            _ => None,
        }
    }

    /// Returns the team id when the actor is a team.
    #[must_use]
    pub fn team_id(&self) -> Option<TeamId> {
        match self {
            Self::Team(team_id) => Some(*team_id),
            _ => None,
        }
    }

    /// Returns the builtin role when the actor is one.
    #[must_use]
    pub fn builtin_role(&self) -> Option<BuiltinRole> {
        match self {
            Self::BuiltinRole(role) => Some(*role),
            _ => None,
        }
    }

    /// Returns the identifier segment used in managed role names.
    #[must_use]
    pub fn name_segment(&self) -> String {
        match self {
            Self::User(user_id) => user_id.to_string(),
            Self::Team(team_id) => team_id.to_string(),
            Self::BuiltinRole(role) => role.slug().to_owned(),
        }
    }
}

impl Display for ActorRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(user_id) => write!(formatter, "user:{user_id}"),
            Self::Team(team_id) => write!(formatter, "team:{team_id}"),
            Self::BuiltinRole(role) => write!(formatter, "builtin:{role}"),
        }
    }
}
