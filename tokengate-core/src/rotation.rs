//! Landing-page and rotation decisions.

use crate::config::{GuardConfig, RotationStrictness};

/// How a request ended, as far as token bookkeeping is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A presented token was checked and accepted
    Validated,
    /// A protected request was rejected
    Rejected,
    /// No check took place (exempt request or landing page)
    Unchecked,
}

/// What to do with the acted-upon token after a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    Rotate,
    IssueIfAbsent,
}

/// Pure function of configuration and session age.
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    use_landing_page: bool,
    strictness: RotationStrictness,
    rotate_on_reject: bool,
}

impl RotationPolicy {
    pub fn new(
        use_landing_page: bool,
        strictness: RotationStrictness,
        rotate_on_reject: bool,
    ) -> Self {
        Self {
            use_landing_page,
            strictness,
            rotate_on_reject,
        }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(
            config.use_new_token_landing_page,
            config.rotation_strictness,
            config.rotate_on_reject,
        )
    }

    /// A brand-new session gets the landing page instead of validation.
    pub fn should_render_landing_page(&self, session_is_new: bool) -> bool {
        session_is_new && self.use_landing_page
    }

    pub fn after_request(&self, outcome: RequestOutcome) -> TokenAction {
        match (outcome, self.strictness) {
            (RequestOutcome::Validated, RotationStrictness::Always) => TokenAction::Rotate,
            (RequestOutcome::Rejected, _) if self.rotate_on_reject => TokenAction::Rotate,
            _ => TokenAction::IssueIfAbsent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landing_page_decision() {
        let on = RotationPolicy::new(true, RotationStrictness::IfAbsent, false);
        assert!(on.should_render_landing_page(true));
        assert!(!on.should_render_landing_page(false));

        let off = RotationPolicy::new(false, RotationStrictness::IfAbsent, false);
        assert!(!off.should_render_landing_page(true));
    }

    #[test]
    fn test_always_rotates_after_validation() {
        let policy = RotationPolicy::new(false, RotationStrictness::Always, false);
        assert_eq!(policy.after_request(RequestOutcome::Validated), TokenAction::Rotate);
        assert_eq!(
            policy.after_request(RequestOutcome::Unchecked),
            TokenAction::IssueIfAbsent
        );
        assert_eq!(
            policy.after_request(RequestOutcome::Rejected),
            TokenAction::IssueIfAbsent
        );
    }

    #[test]
    fn test_if_absent_never_rotates_valid_requests() {
        let policy = RotationPolicy::new(false, RotationStrictness::IfAbsent, false);
        assert_eq!(
            policy.after_request(RequestOutcome::Validated),
            TokenAction::IssueIfAbsent
        );
    }

    #[test]
    fn test_rotate_on_reject() {
        let policy = RotationPolicy::new(false, RotationStrictness::IfAbsent, true);
        assert_eq!(policy.after_request(RequestOutcome::Rejected), TokenAction::Rotate);
        assert_eq!(
            policy.after_request(RequestOutcome::Validated),
            TokenAction::IssueIfAbsent
        );
    }

    #[test]
    fn test_from_config() {
        let config = GuardConfig::default()
            .with_new_token_landing_page(true)
            .with_rotation_strictness(RotationStrictness::Always);
        let policy = RotationPolicy::from_config(&config);

        assert!(policy.should_render_landing_page(true));
        assert_eq!(policy.after_request(RequestOutcome::Validated), TokenAction::Rotate);
    }
}
