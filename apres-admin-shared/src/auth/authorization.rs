/// Role policy: which routes need which role
///
/// Every route of the API names one [`Action`]. The [`RolePolicy`] maps each
/// action to a [`Requirement`]; the router consults it before the handler
/// runs. Defaults reproduce the access rules of the existing admin frontend
/// and can be overridden per action from configuration.
///
/// Only the role inside a verified token is ever evaluated. Public actions
/// evaluate nothing at all.
///
/// # Example
///
/// ```
/// use apres_admin_shared::auth::authorization::{Action, Requirement, RolePolicy};
/// use apres_admin_shared::auth::jwt::Identity;
/// use apres_admin_shared::models::user::Role;
///
/// let policy = RolePolicy::default()
///     .with_overrides("delete-town=admin")
///     .unwrap();
///
/// let admin = Identity { user_id: 1, role: Role::Admin };
/// let user = Identity { user_id: 2, role: Role::User };
///
/// assert_eq!(policy.requirement(Action::DeleteTown), Requirement::AtLeast(Role::Admin));
/// assert!(policy.authorize(Action::DeleteTown, Some(&admin)).is_ok());
/// assert!(policy.authorize(Action::DeleteTown, Some(&user)).is_err());
/// assert!(policy.authorize(Action::ReadDirectory, None).is_ok());
/// ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::jwt::Identity;
use crate::models::user::Role;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// The action needs an identity and the request carried none
    #[error("Authentication required")]
    Unauthenticated,

    /// The identity's role is below the required one
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: Role, actual: Role },
}

/// Every access-controlled operation exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Health,
    Login,
    Signup,
    ValidateToken,
    ListUsers,
    CreateUser,
    ViewUser,
    UpdateUser,
    DeleteUser,
    /// Any read of states, towns, venues, businesses, bands, calendars or events
    ReadDirectory,
    /// Creating or deleting a state
    ManageStates,
    CreateTown,
    DeleteTown,
    CreateVenue,
    DeleteVenue,
    CreateBusiness,
    UpdateBusiness,
    DeleteBusiness,
    CreateBand,
    DeleteBand,
    CreateEvent,
    DeleteEvent,
}

impl Action {
    pub const ALL: [Action; 22] = [
        Action::Health,
        Action::Login,
        Action::Signup,
        Action::ValidateToken,
        Action::ListUsers,
        Action::CreateUser,
        Action::ViewUser,
        Action::UpdateUser,
        Action::DeleteUser,
        Action::ReadDirectory,
        Action::ManageStates,
        Action::CreateTown,
        Action::DeleteTown,
        Action::CreateVenue,
        Action::DeleteVenue,
        Action::CreateBusiness,
        Action::UpdateBusiness,
        Action::DeleteBusiness,
        Action::CreateBand,
        Action::DeleteBand,
        Action::CreateEvent,
        Action::DeleteEvent,
    ];

    /// Name used in logs and in `ACCESS_POLICY`
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Health => "health",
            Action::Login => "login",
            Action::Signup => "signup",
            Action::ValidateToken => "validate-token",
            Action::ListUsers => "list-users",
            Action::CreateUser => "create-user",
            Action::ViewUser => "view-user",
            Action::UpdateUser => "update-user",
            Action::DeleteUser => "delete-user",
            Action::ReadDirectory => "read-directory",
            Action::ManageStates => "manage-states",
            Action::CreateTown => "create-town",
            Action::DeleteTown => "delete-town",
            Action::CreateVenue => "create-venue",
            Action::DeleteVenue => "delete-venue",
            Action::CreateBusiness => "create-business",
            Action::UpdateBusiness => "update-business",
            Action::DeleteBusiness => "delete-business",
            Action::CreateBand => "create-band",
            Action::DeleteBand => "delete-band",
            Action::CreateEvent => "create-event",
            Action::DeleteEvent => "delete-event",
        }
    }

    /// Requirement applied when no override is configured
    pub fn default_requirement(&self) -> Requirement {
        match self {
            Action::ValidateToken => Requirement::Authenticated,
            Action::ListUsers => Requirement::AtLeast(Role::Superuser),
            Action::ManageStates => Requirement::AtLeast(Role::Admin),
            Action::Health
            | Action::Login
            | Action::Signup
            | Action::CreateUser
            | Action::ViewUser
            | Action::UpdateUser
            | Action::DeleteUser
            | Action::ReadDirectory
            | Action::CreateTown
            | Action::DeleteTown
            | Action::CreateVenue
            | Action::DeleteVenue
            | Action::CreateBusiness
            | Action::UpdateBusiness
            | Action::DeleteBusiness
            | Action::CreateBand
            | Action::DeleteBand
            | Action::CreateEvent
            | Action::DeleteEvent => Requirement::Public,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a policy string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyParseError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown requirement: {0}")]
    UnknownRequirement(String),

    #[error("Malformed policy entry: {0} (expected action=requirement)")]
    MalformedEntry(String),
}

impl FromStr for Action {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| PolicyParseError::UnknownAction(name.to_string()))
    }
}

/// What a request must carry to perform an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Anyone; the Authorization header is not even read
    Public,

    /// Any valid token
    Authenticated,

    /// A valid token whose role is at least this one
    AtLeast(Role),
}

impl FromStr for Requirement {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Requirement::Public),
            "authenticated" => Ok(Requirement::Authenticated),
            other => other
                .parse::<Role>()
                .map(Requirement::AtLeast)
                .map_err(|_| PolicyParseError::UnknownRequirement(other.to_string())),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Public => f.write_str("public"),
            Requirement::Authenticated => f.write_str("authenticated"),
            Requirement::AtLeast(role) => write!(f, "{}", role),
        }
    }
}

/// Action → requirement table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePolicy {
    overrides: HashMap<Action, Requirement>,
}

impl RolePolicy {
    /// Applies overrides written as `action=requirement` pairs separated by commas
    ///
    /// Requirements are `public`, `authenticated`, or a role name meaning
    /// "this role or higher". Empty entries are ignored.
    pub fn with_overrides(mut self, overrides: &str) -> Result<Self, PolicyParseError> {
        for entry in overrides.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (action, requirement) = entry
                .split_once('=')
                .ok_or_else(|| PolicyParseError::MalformedEntry(entry.to_string()))?;

            self.overrides
                .insert(action.parse()?, requirement.parse()?);
        }

        Ok(self)
    }

    /// Replaces the requirement of one action
    pub fn set(&mut self, action: Action, requirement: Requirement) {
        self.overrides.insert(action, requirement);
    }

    pub fn requirement(&self, action: Action) -> Requirement {
        self.overrides
            .get(&action)
            .copied()
            .unwrap_or_else(|| action.default_requirement())
    }

    /// Decides whether `identity` may perform `action`
    ///
    /// `identity` is `None` when the request carried no token.
    pub fn authorize(&self, action: Action, identity: Option<&Identity>) -> Result<(), AuthzError> {
        match self.requirement(action) {
            Requirement::Public => Ok(()),
            Requirement::Authenticated => identity.map(|_| ()).ok_or(AuthzError::Unauthenticated),
            Requirement::AtLeast(required) => {
                let identity = identity.ok_or(AuthzError::Unauthenticated)?;
                if identity.role.has_permission(&required) {
                    Ok(())
                } else {
                    Err(AuthzError::InsufficientRole {
                        required,
                        actual: identity.role,
                    })
                }
            }
        }
    }
}
