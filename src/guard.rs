use crate::models::{Principal, Role};

/// Navigation outcome for a role-gated route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    ShowLoadingIndicator,
    RedirectToLogin,
    Admit,
}

impl RouteDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteDecision::ShowLoadingIndicator => "show_loading",
            RouteDecision::RedirectToLogin => "redirect_to_login",
            RouteDecision::Admit => "admit",
        }
    }
}

/// Pure route-guard decision: session still resolving wins over everything,
/// then a missing or wrong-role principal redirects to login.
pub fn decide(principal: Option<&Principal>, required: Role, loading: bool) -> RouteDecision {
    if loading {
        return RouteDecision::ShowLoadingIndicator;
    }
    match principal {
        Some(p) if p.role == required => RouteDecision::Admit,
        _ => RouteDecision::RedirectToLogin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: "u1".to_string(),
            email: "u1@x.com".to_string(),
            name: "U One".to_string(),
            role,
        }
    }

    #[test]
    fn no_principal_redirects_for_every_role() {
        for role in [Role::Teacher, Role::Student] {
            assert_eq!(decide(None, role, false), RouteDecision::RedirectToLogin);
        }
    }

    #[test]
    fn role_mismatch_redirects() {
        let p = principal(Role::Teacher);
        assert_eq!(
            decide(Some(&p), Role::Student, false),
            RouteDecision::RedirectToLogin
        );
        let p = principal(Role::Student);
        assert_eq!(
            decide(Some(&p), Role::Teacher, false),
            RouteDecision::RedirectToLogin
        );
    }

    #[test]
    fn loading_wins_regardless_of_principal() {
        let p = principal(Role::Teacher);
        assert_eq!(
            decide(Some(&p), Role::Teacher, true),
            RouteDecision::ShowLoadingIndicator
        );
        assert_eq!(
            decide(None, Role::Student, true),
            RouteDecision::ShowLoadingIndicator
        );
    }

    #[test]
    fn matching_role_admits() {
        let p = principal(Role::Student);
        assert_eq!(decide(Some(&p), Role::Student, false), RouteDecision::Admit);
    }
}
