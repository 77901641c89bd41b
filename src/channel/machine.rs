// src/channel/machine.rs
use std::time::Duration;

use serde::Serialize;

use crate::models::messages::Outbound;
use crate::notices::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Side effects requested by a transition. The manager carries them out.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkAction {
    Open,
    Close,
    Send(Outbound),
    ScheduleReconnect(Duration),
    DropPending,
    Notify(Level, String),
}

/// Lifecycle of the scanner connection:
/// disconnected -> connecting -> connected -> disconnected -> (delay) -> connecting.
#[derive(Debug)]
pub struct LinkMachine {
    state: ConnectionState,
    use_realtime: bool,
    reconnect_pending: bool,
    api_key: Option<String>,
    reconnect_delay: Duration,
}

impl LinkMachine {
    pub fn new(use_realtime: bool, reconnect_delay: Duration, api_key: Option<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            use_realtime,
            reconnect_pending: false,
            api_key,
            reconnect_delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn use_realtime(&self) -> bool {
        self.use_realtime
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn start(&mut self) -> Vec<LinkAction> {
        if !self.use_realtime || self.reconnect_pending || self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        self.state = ConnectionState::Connecting;
        vec![LinkAction::Open]
    }

    pub fn opened(&mut self) -> Vec<LinkAction> {
        // Realtime was switched off while the connection was being set up.
        if !self.use_realtime {
            return vec![LinkAction::Close];
        }
        self.state = ConnectionState::Connected;
        let mut actions = vec![LinkAction::Notify(
            Level::Success,
            "Connected to scanner".to_string(),
        )];
        match &self.api_key {
            Some(key) => actions.push(LinkAction::Send(Outbound::SetApiKey {
                api_key: key.clone(),
            })),
            None => actions.push(LinkAction::Notify(
                Level::Warning,
                "No API key set, scanner will not start".to_string(),
            )),
        }
        actions
    }

    pub fn closed(&mut self, reason: &str) -> Vec<LinkAction> {
        let previous = self.state;
        self.state = ConnectionState::Disconnected;

        let mut actions = vec![LinkAction::DropPending];
        match previous {
            ConnectionState::Connected => actions.push(LinkAction::Notify(
                Level::Warning,
                format!("Lost connection to scanner: {}", reason),
            )),
            ConnectionState::Connecting if self.use_realtime => actions.push(LinkAction::Notify(
                Level::Error,
                format!("Could not connect to scanner: {}", reason),
            )),
            ConnectionState::Connecting | ConnectionState::Disconnected => {}
        }

        if self.use_realtime && !self.reconnect_pending {
            self.reconnect_pending = true;
            actions.push(LinkAction::ScheduleReconnect(self.reconnect_delay));
        }
        actions
    }

    pub fn reconnect_due(&mut self) -> Vec<LinkAction> {
        self.reconnect_pending = false;
        self.start()
    }

    pub fn set_api_key(&mut self, key: String) -> Vec<LinkAction> {
        self.api_key = Some(key.clone());
        if self.state == ConnectionState::Connected {
            vec![LinkAction::Send(Outbound::SetApiKey { api_key: key })]
        } else {
            Vec::new()
        }
    }

    pub fn authenticated(&mut self, accepted: bool, message: Option<String>) -> Vec<LinkAction> {
        if accepted {
            vec![
                LinkAction::Notify(Level::Success, "Scanner accepted the API key".to_string()),
                LinkAction::Send(Outbound::GetInitialState),
            ]
        } else {
            vec![LinkAction::Notify(
                Level::Error,
                format!(
                    "Scanner rejected the API key: {}",
                    message.unwrap_or_else(|| "no reason given".to_string())
                ),
            )]
        }
    }

    pub fn set_use_realtime(&mut self, enabled: bool) -> Vec<LinkAction> {
        self.use_realtime = enabled;
        if enabled {
            self.start()
        } else if self.state != ConnectionState::Disconnected {
            vec![LinkAction::Close]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(5);

    fn reconnects(actions: &[LinkAction]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, LinkAction::ScheduleReconnect(_)))
            .count()
    }

    #[test]
    fn open_sends_known_key() {
        let mut machine = LinkMachine::new(true, DELAY, Some("KEY1234567".into()));
        assert_eq!(machine.start(), vec![LinkAction::Open]);
        assert_eq!(machine.state(), ConnectionState::Connecting);

        let actions = machine.opened();
        assert_eq!(machine.state(), ConnectionState::Connected);
        assert!(actions.contains(&LinkAction::Send(Outbound::SetApiKey {
            api_key: "KEY1234567".into()
        })));
    }

    #[test]
    fn open_without_key_sends_nothing() {
        let mut machine = LinkMachine::new(true, DELAY, None);
        machine.start();
        let actions = machine.opened();
        assert!(!actions.iter().any(|a| matches!(a, LinkAction::Send(_))));
    }

    #[test]
    fn second_close_does_not_duplicate_reconnect() {
        let mut machine = LinkMachine::new(true, DELAY, None);
        machine.start();
        machine.opened();

        let first = machine.closed("reset by peer");
        assert_eq!(reconnects(&first), 1);
        assert!(first.contains(&LinkAction::ScheduleReconnect(DELAY)));
        assert_eq!(machine.state(), ConnectionState::Disconnected);

        let second = machine.closed("error after close");
        assert_eq!(reconnects(&second), 0);

        assert_eq!(machine.reconnect_due(), vec![LinkAction::Open]);
        assert_eq!(machine.state(), ConnectionState::Connecting);

        // The next failure schedules again.
        assert_eq!(reconnects(&machine.closed("refused")), 1);
    }

    #[test]
    fn no_reconnect_when_realtime_disabled() {
        let mut machine = LinkMachine::new(true, DELAY, None);
        machine.start();
        machine.opened();
        assert_eq!(machine.set_use_realtime(false), vec![LinkAction::Close]);
        assert_eq!(reconnects(&machine.closed("closed locally")), 0);
        assert!(machine.reconnect_due().is_empty());
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disabling_realtime_while_connecting_closes_on_open() {
        let mut machine = LinkMachine::new(true, DELAY, Some("KEY1234567".into()));
        machine.start();
        assert_eq!(machine.set_use_realtime(false), vec![LinkAction::Close]);

        assert_eq!(machine.opened(), vec![LinkAction::Close]);
        assert_ne!(machine.state(), ConnectionState::Connected);

        assert_eq!(reconnects(&machine.closed("closed locally")), 0);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn start_is_ignored_while_reconnect_pending() {
        let mut machine = LinkMachine::new(true, DELAY, None);
        machine.start();
        machine.closed("refused");
        assert!(machine.start().is_empty());
        assert!(machine.reconnect_pending());
    }

    #[test]
    fn auth_success_requests_initial_state() {
        let mut machine = LinkMachine::new(true, DELAY, Some("KEY1234567".into()));
        let actions = machine.authenticated(true, None);
        assert!(actions.contains(&LinkAction::Send(Outbound::GetInitialState)));

        let actions = machine.authenticated(false, Some("bad key".into()));
        assert!(!actions.iter().any(|a| matches!(a, LinkAction::Send(_))));
    }

    #[test]
    fn key_set_while_connected_is_sent_immediately() {
        let mut machine = LinkMachine::new(true, DELAY, None);
        assert!(machine.set_api_key("KEY1234567".into()).is_empty());
        machine.start();
        machine.opened();
        assert_eq!(
            machine.set_api_key("OTHERKEY99".into()),
            vec![LinkAction::Send(Outbound::SetApiKey {
                api_key: "OTHERKEY99".into()
            })]
        );
    }
}
