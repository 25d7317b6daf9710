//! 调用方身份（由外部认证模块提供，不做校验与解码）

use std::fmt;

/// 调用方角色
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// 管理员：后端分页为准
    Admin,
    /// 其他角色：后端无分页
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Other(trimmed.to_string())
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "ADMIN",
            Role::Other(role) => role.as_str(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 会话身份
#[derive(Clone)]
pub struct SessionIdentity {
    pub user_id: String,
    pub role: Role,
    pub access_token: Option<String>,
}

impl SessionIdentity {
    pub fn new(user_id: impl Into<String>, role: &str) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::parse(role),
            access_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

// 令牌不进入日志
impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}
