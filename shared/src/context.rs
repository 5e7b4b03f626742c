use crate::actor::PlayerId;
use crate::error::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkRole {
    Authority,
    Client,
}

/// Where an operation is executing. Passed explicitly instead of being
/// queried from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub role: NetworkRole,
    /// Player whose inputs this process owns, if any.
    pub local_player: Option<PlayerId>,
    /// Dedicated servers never render effects.
    pub dedicated: bool,
}

impl ExecutionContext {
    pub fn dedicated_server() -> Self {
        Self {
            role: NetworkRole::Authority,
            local_player: None,
            dedicated: true,
        }
    }

    /// Authority that also hosts a local player.
    pub fn listen_server(local_player: PlayerId) -> Self {
        Self {
            role: NetworkRole::Authority,
            local_player: Some(local_player),
            dedicated: false,
        }
    }

    pub fn client(local_player: Option<PlayerId>) -> Self {
        Self {
            role: NetworkRole::Client,
            local_player,
            dedicated: false,
        }
    }

    pub fn is_authority(&self) -> bool {
        self.role == NetworkRole::Authority
    }

    pub fn renders_effects(&self) -> bool {
        !self.dedicated
    }

    pub fn is_locally_controlled(&self, owner: PlayerId) -> bool {
        self.local_player == Some(owner)
    }

    /// Guard placed at every gameplay mutation.
    pub fn require_authority(&self, what: &'static str) -> Result<(), GameError> {
        if self.is_authority() {
            Ok(())
        } else {
            Err(GameError::UnauthorizedMutation(what))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_authority() {
        assert!(ExecutionContext::dedicated_server()
            .require_authority("score")
            .is_ok());
        assert_eq!(
            ExecutionContext::client(Some(PlayerId(0))).require_authority("score"),
            Err(GameError::UnauthorizedMutation("score"))
        );
    }

    #[test]
    fn test_effects_and_control() {
        let server = ExecutionContext::dedicated_server();
        assert!(!server.renders_effects());
        assert!(!server.is_locally_controlled(PlayerId(0)));

        let host = ExecutionContext::listen_server(PlayerId(0));
        assert!(host.renders_effects());
        assert!(host.is_locally_controlled(PlayerId(0)));
        assert!(!host.is_locally_controlled(PlayerId(1)));
    }
}
