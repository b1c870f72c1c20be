use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Roles a teacher can hold within a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    OrgOwner,
    OrgAdmin,
    SchoolAdmin,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::OrgOwner => "org_owner",
            Role::OrgAdmin => "org_admin",
            Role::SchoolAdmin => "school_admin",
            Role::Teacher => "teacher",
        }
    }

    pub fn is_org_level(&self) -> bool {
        matches!(self, Role::OrgOwner | Role::OrgAdmin)
    }

    pub fn is_school_level(&self) -> bool {
        matches!(self, Role::SchoolAdmin | Role::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "org_owner" => Ok(Role::OrgOwner),
            "org_admin" => Ok(Role::OrgAdmin),
            "school_admin" => Ok(Role::SchoolAdmin),
            "teacher" => Ok(Role::Teacher),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Organization,
    School,
    Teacher,
    Classroom,
    Student,
    Assignment,
    Subscription,
    ManageMaterials,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Organization => "organization",
            Resource::School => "school",
            Resource::Teacher => "teacher",
            Resource::Classroom => "classroom",
            Resource::Student => "student",
            Resource::Assignment => "assignment",
            Resource::Subscription => "subscription",
            Resource::ManageMaterials => "manage_materials",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

/// Which tenant boundary a domain token names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Org,
    School,
}

/// A scope token: `org-{id}` or `school-{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Org(i32),
    School(i32),
}

impl Domain {
    pub fn kind(&self) -> DomainKind {
        match self {
            Domain::Org(_) => DomainKind::Org,
            Domain::School(_) => DomainKind::School,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Org(id) => write!(f, "org-{}", id),
            Domain::School(id) => write!(f, "school-{}", id),
        }
    }
}

impl FromStr for Domain {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("org-") {
            return id.parse().map(Domain::Org).map_err(|_| ());
        }
        if let Some(id) = s.strip_prefix("school-") {
            return id.parse().map(Domain::School).map_err(|_| ());
        }
        Err(())
    }
}
