//! Access policy: who may do what, and which ledger rows they can see.
//!
//! A request's caller is resolved once into an [`AccessPolicy`]; handlers then
//! ask it for [`Capability`] checks and services use it to scope queries to
//! the records the caller owns.

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{
        borrowing::{parse_active_flag, parse_user_filter, BorrowingFilter, BorrowingQuery},
        user::UserClaims,
        BorrowingDetails,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Anonymous,
    Member,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadCatalog,
    WriteCatalog,
    ReadBorrowings,
    CreateBorrowing,
    ReturnBorrowing,
    ManageProfile,
}

impl Capability {
    fn describe(&self) -> &'static str {
        match self {
            Capability::ReadCatalog => "read the catalog",
            Capability::WriteCatalog => "modify the catalog",
            Capability::ReadBorrowings => "read borrowings",
            Capability::CreateBorrowing => "borrow books",
            Capability::ReturnBorrowing => "return borrowings",
            Capability::ManageProfile => "manage a profile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    role: Role,
    user_id: Option<i32>,
    members_may_return: bool,
}

impl AccessPolicy {
    pub fn anonymous() -> Self {
        Self {
            role: Role::Anonymous,
            user_id: None,
            members_may_return: false,
        }
    }

    pub fn for_claims(claims: &UserClaims, lending: &LendingConfig) -> Self {
        Self {
            role: if claims.is_staff { Role::Staff } else { Role::Member },
            user_id: Some(claims.user_id),
            members_may_return: lending.members_may_return,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match (self.role, capability) {
            (_, Capability::ReadCatalog) => true,
            (Role::Anonymous, _) => false,
            (Role::Staff, _) => true,
            (Role::Member, Capability::WriteCatalog) => false,
            (Role::Member, Capability::ReturnBorrowing) => self.members_may_return,
            (Role::Member, _) => true,
        }
    }

    /// Anonymous callers get 401, authenticated ones 403.
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.allows(capability) {
            return Ok(());
        }
        match self.role {
            Role::Anonymous => Err(AppError::Authentication(
                "Authentication credentials were not provided".to_string(),
            )),
            _ => Err(AppError::Authorization(format!(
                "You do not have permission to {}",
                capability.describe()
            ))),
        }
    }

    /// Authenticated user ID, or 401
    pub fn user_id(&self) -> AppResult<i32> {
        self.user_id.ok_or_else(|| {
            AppError::Authentication("Authentication credentials were not provided".to_string())
        })
    }

    /// Turn list query parameters into the filter this caller is entitled to.
    /// Non-staff callers are pinned to their own rows and their filters ignored.
    pub fn scope(&self, query: &BorrowingQuery) -> AppResult<BorrowingFilter> {
        match self.role {
            Role::Staff => Ok(BorrowingFilter {
                user_id: parse_user_filter(query.user_id.as_deref())?,
                active: parse_active_flag(query.is_active.as_deref())?,
            }),
            _ => Ok(BorrowingFilter {
                user_id: Some(self.user_id()?),
                active: None,
            }),
        }
    }

    pub fn can_see(&self, borrowing: &BorrowingDetails) -> bool {
        match self.role {
            Role::Staff => true,
            _ => self.user_id == Some(borrowing.user),
        }
    }
}
