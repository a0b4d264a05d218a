use clap::{Parser, Subcommand, ValueEnum};
use grantry_core::{AppError, AppResult};
use grantry_domain::{TeamId, UserId};


#[derive(Debug, Parser)]
#[command(name = "grantry-admin")]
#[command(about = "Operate the Grantry resource permission store", long_about = None)]
#[command(version)]
pub struct AdminCli {
    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum AdminCommand {
    /// Apply database migrations and exit
    Migrate,
    /// Declare the complete action set of one actor on a resource instance
    Set {
        /// Kind of actor receiving the grants
        #[arg(value_enum)]
        kind: ActorKindArg,
        /// User id, team id or builtin role name
        actor: String,
        /// Resource kind, e.g. datasources
        resource: String,
        /// Resource instance identifier
        resource_id: String,
        /// Desired actions; none revokes every grant
        actions: Vec<String>,
    },
    /// List grants on one or more instances of a resource kind
    Get {
        /// Resource kind, e.g. datasources
        resource: String,
        /// Comma-separated resource instance identifiers
        #[arg(value_parser = parse_resource_ids)]
        resource_ids: ResourceIds,
        /// Only return grants holding all of these actions
        actions: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActorKindArg {
    User,
    Team,
    Builtin,
}

/// Actor addressed by a `set` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetTarget {
    User(UserId),
    Team(TeamId),
    Builtin(String),
}

impl ActorKindArg {
    /// Resolves the positional actor argument for this kind.
    pub fn target(self, actor: &str) -> AppResult<SetTarget> {
        match self {
            Self::User => Ok(SetTarget::User(UserId::new(parse_id("user id", actor)?)?)),
            Self::Team => Ok(SetTarget::Team(TeamId::new(parse_id("team id", actor)?)?)),
            Self::Builtin => Ok(SetTarget::Builtin(actor.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIds(Vec<String>);

impl ResourceIds {
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

fn parse_resource_ids(value: &str) -> Result<ResourceIds, String> {
    let resource_ids: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|resource_id| !resource_id.is_empty())
        .map(str::to_owned)
        .collect();

    if resource_ids.is_empty() {
        return Err("at least one resource id is required".to_owned());
    }

    Ok(ResourceIds(resource_ids))
}

fn parse_id(name: &str, value: &str) -> AppResult<i64> {
    value
        .parse::<i64>()
        .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}")))
}
